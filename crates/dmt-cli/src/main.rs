use clap::{Args as ClapArgs, Parser, Subcommand};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use dmt_core::{JsonOpts, ParseOptions};

#[derive(Parser, Debug)]
#[command(
    name = "dmt",
    about = "Inspect Digital Micrograph DM3/DM4 tag trees",
    version
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Dump a file or directory as JSON
    Dump(DumpArgs),
    /// Print the decoded value at a tag path
    Get(GetArgs),
    /// List every leaf path with its type and size
    Paths(PathsArgs),
    /// Report which files look like DM3/DM4
    Scan(ScanArgs),
}

#[derive(ClapArgs, Debug, Clone, Copy)]
struct ReadOpts {
    /// Max group and typespec nesting depth
    #[arg(long, default_value_t = 256)]
    max_depth: usize,
    /// Max array elements to include per array
    #[arg(long, default_value_t = 128)]
    max_array: usize,
    /// Print long arrays element by element instead of a summary
    #[arg(long, default_value_t = false)]
    full: bool,
}

impl ReadOpts {
    fn parse_opts(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_depth,
        }
    }
    fn json_opts(&self) -> JsonOpts {
        JsonOpts {
            max_array_elems: self.max_array,
            summarize_arrays: !self.full,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    /// .dm3/.dm4 file or a directory of them
    path: PathBuf,
    #[command(flatten)]
    opts: ReadOpts,
}

#[derive(ClapArgs, Debug)]
struct GetArgs {
    file: PathBuf,
    /// Tag path, e.g. /ImageList/1/ImageData/Calibrations/Brightness/Scale
    tag_path: String,
    #[command(flatten)]
    opts: ReadOpts,
}

#[derive(ClapArgs, Debug)]
struct PathsArgs {
    file: PathBuf,
    #[arg(long, default_value_t = 256)]
    max_depth: usize,
}

#[derive(ClapArgs, Debug)]
struct ScanArgs {
    dir: PathBuf,
    /// Descend into subdirectories
    #[arg(short, long, default_value_t = false)]
    recursive: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Get(a) => cmd_get(a),
        Cmd::Paths(a) => cmd_paths(a),
        Cmd::Scan(a) => cmd_scan(a),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("dmt_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", msg);
    std::process::exit(2);
}

fn read_file(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap_or_else(|e| fail(format!("{}: {}", path.display(), e)))
}

fn print_json(v: &serde_json::Value) {
    match serde_json::to_string_pretty(v) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(e),
    }
}

fn cmd_dump(args: DumpArgs) {
    let p = args.path.as_path();
    let v = if p.is_file() {
        let data = read_file(p);
        let file = dmt_core::parse_with(&data, &args.opts.parse_opts())
            .unwrap_or_else(|e| fail(format!("{}: {}", p.display(), e)));
        dmt_core::tree_to_json(&file, args.opts.json_opts())
    } else if p.is_dir() {
        dmt_core::dump_dir_json(p, args.opts.json_opts())
    } else {
        fail(format!("not found: {}", p.display()))
    };
    print_json(&v);
}

fn cmd_get(args: GetArgs) {
    let data = read_file(&args.file);
    let file = dmt_core::parse_with(&data, &args.opts.parse_opts())
        .unwrap_or_else(|e| fail(format!("{}: {}", args.file.display(), e)));
    let index = file.index();
    match index.get(&args.tag_path) {
        Some(t) => print_json(&dmt_core::leaf_to_json(
            t,
            index.endianness(),
            &args.opts.json_opts(),
        )),
        None => {
            eprintln!("not found: {}", args.tag_path);
            std::process::exit(3);
        }
    }
}

fn cmd_paths(args: PathsArgs) {
    let data = read_file(&args.file);
    let opts = ParseOptions {
        max_depth: args.max_depth,
    };
    let file = dmt_core::parse_with(&data, &opts)
        .unwrap_or_else(|e| fail(format!("{}: {}", args.file.display(), e)));
    for (path, t) in file.index().iter() {
        println!(
            "{}\t{}\t{}",
            path,
            dmt_core::typespec::describe(&t.typespec),
            t.byte_size
        );
    }
}

/// Enough of the file to cover the header, root flags and a `%%%%` marker.
const SCAN_HEAD_LEN: u64 = 4096;

fn cmd_scan(args: ScanArgs) {
    if !args.dir.is_dir() {
        fail(format!("not a directory: {}", args.dir.display()));
    }
    for path in dmt_core::find_tag_files(&args.dir, args.recursive) {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let detection = read_head(&path)
            .map(|(head, size)| dmt_core::detect(&name, &head, size))
            .unwrap_or_else(|e| {
                tracing::warn!(file = %path.display(), error = %e, "cannot read file head");
                dmt_core::detect_name_only(&name)
            });
        match detection {
            Some(d) => println!("{}\t{}\t{}", path.display(), d.variant.extension(), d.score),
            None => println!("{}\t-\t0", path.display()),
        }
    }
}

fn read_head(path: &Path) -> std::io::Result<(Vec<u8>, u64)> {
    let f = File::open(path)?;
    let size = f.metadata()?.len();
    let mut head = Vec::new();
    f.take(SCAN_HEAD_LEN).read_to_end(&mut head)?;
    Ok((head, size))
}
