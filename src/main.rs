use clap::{Parser, Subcommand};
use log::info;
use pstcheck::layout::{FormatVersion, HeaderRecord, RootRecord, HEADER_SIZE, ROOT_OFFSET};
use pstcheck::{Finding, ValidationReport, Validator};
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pstcheck", about = "Structural integrity checker for PST/OST mailbox files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more mailbox files
    Check {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
        /// Emit findings as JSON instead of a text report
        #[arg(long)]
        json: bool,
        /// Rename corrupt files to <name>.corrupt-<timestamp>
        #[arg(short, long, conflicts_with = "delete")]
        quarantine: bool,
        /// Delete corrupt files
        #[arg(long, conflicts_with = "quarantine")]
        delete: bool,
    },
    /// Show header and root metadata without a verdict
    Info {
        file: PathBuf,
    },
    /// List candidate mailbox files in the usual mail-store directories
    Locate {
        /// Search this directory instead of the per-OS defaults
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    valid: bool,
    findings: &'a [Finding],
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {
        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { files, json, quarantine, delete } => {
            let validator = Validator::new();
            let mut corrupt = 0usize;

            for path in &files {
                let report = validator.validate_file(path);
                if json {
                    print_json(path, &report)?;
                } else {
                    print_text(path, &report);
                }
                if !report.is_valid() {
                    corrupt += 1;
                    if quarantine {
                        let renamed = quarantine_file(path)?;
                        eprintln!("  quarantined as {}", renamed.display());
                    } else if delete {
                        std::fs::remove_file(path)?;
                        eprintln!("  deleted {}", path.display());
                    }
                }
            }

            if !json {
                println!("{} file(s) checked, {} corrupt", files.len(), corrupt);
            }
            if corrupt > 0 {
                std::process::exit(1);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { file } => {
            let (header, root) = read_metadata(&file)?;
            println!("── Mailbox file ────────────────────────────────────────");
            println!("  Path            {}", file.display());
            println!("  Magic           0x{:08X}", header.magic);
            println!("  Stored checksum 0x{:08X}", header.stored_crc);
            println!("  Client magic    0x{:04X}", header.client_magic);
            match FormatVersion::from_wire(header.version) {
                Some(v) => println!("  Format          {}", v.name()),
                None => println!("  Format          unknown (version {})", header.version),
            }
            println!("  Client version  {}", header.client_version);
            println!("  Platforms       create={} access={}",
                     header.platform_create, header.platform_access);
            if let Some(root) = root {
                println!("  EOF offset      {} B", root.file_eof);
                println!("  Last AMap page  {:#x}", root.amap_last);
                println!("  AMap free       {} B", root.amap_free);
                println!("  PMap free       {} B", root.pmap_free);
                println!("  Block index     id={:#x} offset={:#x}",
                         root.block_index_root.id, root.block_index_root.offset);
                println!("  Node index      id={:#x} offset={:#x}",
                         root.node_index_root.id, root.node_index_root.offset);
            }
        }

        // ── Locate ───────────────────────────────────────────────────────────
        Commands::Locate { dir } => {
            let dirs = match dir {
                Some(d) => vec![d],
                None => default_store_dirs(),
            };
            let mut found = 0usize;
            for dir in dirs {
                info!("searching {}", dir.display());
                for path in candidate_files(&dir) {
                    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    println!("{:>12} B  {}", size, path.display());
                    found += 1;
                }
            }
            if found == 0 {
                println!("No mailbox files found.");
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn print_text(path: &Path, report: &ValidationReport) {
    let verdict = if report.is_valid() { "OK" } else { "CORRUPT" };
    println!("{:<8} {}", verdict, path.display());
    for finding in report.findings() {
        println!("  {finding}");
    }
}

fn print_json(path: &Path, report: &ValidationReport) -> serde_json::Result<()> {
    let out = FileReport {
        path: path.display().to_string(),
        valid: report.is_valid(),
        findings: report.findings(),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

/// Decode the header (and, when the version is recognisable, the root record)
/// without running the pipeline.
fn read_metadata(path: &Path) -> Result<(HeaderRecord, Option<RootRecord>), Box<dyn std::error::Error>> {
    let mut f = std::fs::File::open(path)?;
    let mut hdr = [0u8; HEADER_SIZE];
    f.read_exact(&mut hdr)?;
    let header = HeaderRecord::decode(&hdr)?;

    let root = match FormatVersion::from_wire(header.version) {
        Some(version) => {
            f.seek(SeekFrom::Start(ROOT_OFFSET))?;
            let mut buf = vec![0u8; version.root_size()];
            f.read_exact(&mut buf)?;
            Some(RootRecord::decode(&buf, version)?)
        }
        None => None,
    };
    Ok((header, root))
}

/// Rename a corrupt file out of the way, keeping the original bytes.
fn quarantine_file(path: &Path) -> std::io::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let mut renamed = path.as_os_str().to_owned();
    renamed.push(format!(".corrupt-{stamp}"));
    let renamed = PathBuf::from(renamed);
    std::fs::rename(path, &renamed)?;
    Ok(renamed)
}

/// The directories mail clients keep their stores in on this OS.
fn default_store_dirs() -> Vec<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let Some(home) = std::env::var_os(var) else {
        return Vec::new();
    };
    let home = PathBuf::from(home);
    if cfg!(windows) {
        vec![
            home.join("Documents").join("Outlook Files"),
            home.join("AppData").join("Local").join("Microsoft").join("Outlook"),
        ]
    } else {
        vec![home.join("Documents").join("Outlook Files")]
    }
}

/// Non-recursive listing of `.pst`/`.ost` files in `dir`.
fn candidate_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("pst") || ext.eq_ignore_ascii_case("ost"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
