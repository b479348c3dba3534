//! csv-forge – command-line CSV → PDF report generator.
//!
//! Usage:
//!   csv-forge [--file NAME] [--out NAME] [--html NAME] [--title TEXT] [--num]
//!
//! Input is read from `data/NAME.csv`, the template from `html/NAME.html`
//! (or a built-in template), and the PDF is written to `output/NAME.pdf`.

use std::{env, fs, path::PathBuf, process};

use csv_forge::pipeline::{generate_pdf, PipelineConfig};
use csv_forge::templates;
use csv_forge::Error;

const DATA_DIR: &str = "data";
const HTML_DIR: &str = "html";
const OUTPUT_DIR: &str = "output";

#[derive(Debug, Default)]
struct Args {
    file: Option<String>,
    out: Option<String>,
    html: Option<String>,
    title: Option<String>,
    numbered: bool,
    landscape: bool,
    timeout: Option<u64>,
    config: Option<PathBuf>,
    layout_json: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = env::args().collect();
    let prog = argv.first().map(String::as_str).unwrap_or("csv-forge");

    let args = match parse_args(flag_args(&argv)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage(prog);
            process::exit(0);
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            print_usage(prog);
            process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    log::info!("Done");
}

/// Everything after the program name. An exec with an empty argv has none.
fn flag_args(argv: &[String]) -> &[String] {
    argv.get(1..).unwrap_or(&[])
}

/// Parse flags. `Ok(None)` means help was requested.
fn parse_args(raw: &[String]) -> Result<Option<Args>, String> {
    let mut args = Args::default();
    let mut iter = raw.iter();

    while let Some(arg) = iter.next() {
        // Accept `--flag value`, `--flag=value` and the single-dash forms.
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) => (f, Some(v.to_string())),
            None => (arg.as_str(), None),
        };
        let name = flag.trim_start_matches('-');
        if name.len() == flag.len() {
            return Err(format!("unexpected argument: {arg}"));
        }

        let mut value = |flag: &str| -> Result<String, String> {
            match inline.clone() {
                Some(v) => Ok(v),
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| format!("flag {flag} needs a value")),
            }
        };

        match name {
            "file" => args.file = Some(value(flag)?),
            "out" => args.out = Some(value(flag)?),
            "html" => args.html = Some(value(flag)?),
            "title" | "t" => args.title = Some(value(flag)?),
            "num" => args.numbered = true,
            "landscape" | "l" => args.landscape = true,
            "timeout" => {
                let v = value(flag)?;
                let secs = v
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --timeout value: {v}"))?;
                args.timeout = Some(secs);
            }
            "config" => args.config = Some(PathBuf::from(value(flag)?)),
            "layout-json" => args.layout_json = Some(PathBuf::from(value(flag)?)),
            "help" | "h" => return Ok(None),
            _ => return Err(format!("unknown flag: {flag}")),
        }
    }
    Ok(Some(args))
}

fn run(args: Args) -> Result<(), Error> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(title) = args.title {
        config.title = title;
    }
    config.numbered |= args.numbered;
    config.print.landscape |= args.landscape;
    if args.timeout.is_some() {
        config.load_timeout_secs = args.timeout;
    }

    let file = args.file.unwrap_or_else(|| "example".to_string());
    let input = PathBuf::from(DATA_DIR).join(format!("{file}.csv"));
    let csv = fs::File::open(&input).map_err(|e| {
        Error::Config(format!("cannot open '{}': {e}", input.display()))
    })?;

    let template = load_template(args.html.as_deref())?;

    let out_name = args
        .out
        .unwrap_or_else(|| format!("sample_{}", chrono::Utc::now().timestamp()));
    let output = PathBuf::from(OUTPUT_DIR).join(format!("{out_name}.pdf"));

    log::info!("Reading '{}'", input.display());
    let (bytes, layout) = generate_pdf(csv, &template, &config)?;

    fs::create_dir_all(OUTPUT_DIR)?;
    fs::write(&output, &bytes)?;
    let pages = layout.as_ref().map(|l| l.page_count()).unwrap_or(0);
    log::info!(
        "Wrote '{}' ({} bytes, {} page{})",
        output.display(),
        bytes.len(),
        pages,
        if pages == 1 { "" } else { "s" }
    );

    if let (Some(path), Some(layout)) = (args.layout_json, layout) {
        let json = layout
            .to_json()
            .map_err(|e| Error::Config(format!("cannot serialise layout: {e}")))?;
        fs::write(&path, json)?;
        log::info!("Wrote layout snapshot '{}'", path.display());
    }
    Ok(())
}

/// `html/NAME.html` when it exists, else a built-in template of that name.
/// Without a name the built-in default is used.
fn load_template(name: Option<&str>) -> Result<String, Error> {
    let Some(name) = name else {
        return Ok(templates::default_template().to_string());
    };
    let path = PathBuf::from(HTML_DIR).join(format!("{name}.html"));
    match fs::read_to_string(&path) {
        Ok(html) => Ok(html),
        Err(e) => match templates::builtin(name) {
            Some(html) => {
                log::info!("'{}' not found, using built-in '{name}' template", path.display());
                Ok(html.to_string())
            }
            None => Err(Error::Config(format!("cannot read '{}': {e}", path.display()))),
        },
    }
}

fn print_usage(prog: &str) {
    eprintln!("csv-forge – CSV to PDF report generator");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} [--file NAME] [--out NAME] [--html NAME] [--title TEXT] [--num]");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --file NAME           Input data/NAME.csv (default: example)");
    eprintln!("  --out NAME            Output output/NAME.pdf (default: sample_<unix time>)");
    eprintln!("  --html NAME           Template html/NAME.html (default: built-in template)");
    eprintln!("  --title TEXT          Document title (default: Untitled)");
    eprintln!("  --num                 Prefix rows with a running number");
    eprintln!("  --landscape           Landscape page orientation");
    eprintln!("  --timeout SECS        Give up when the page does not load in time");
    eprintln!("  --config FILE         Read pipeline settings from a JSON file");
    eprintln!("  --layout-json FILE    Also write the computed page layout as JSON");
    eprintln!("  --help                Print this message");
}
