use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use threadpool::ThreadPool;
use walkdir::{DirEntry, WalkDir};

mod bktree;
mod cluster;
mod errors;
mod files;
mod fingerprint;
mod loader;
mod plan;

use bktree::BkTree;
use errors::DedupeError;
use fingerprint::Algorithm;
use plan::Action;

//File extensions that may hold images, unless --any-file widens the net
const KNOWN_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif"];

#[derive(Parser)]
#[command(
    name = "imgdedup",
    version,
    about = "Finds near-duplicate images with perceptual hashes and a BK-tree index"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    ///Compute perceptual fingerprints for every image under ROOT
    Hash {
        ///Root folder to scan recursively
        root: PathBuf,

        ///Fingerprint algorithm
        #[arg(long, value_enum, default_value_t = Algorithm::Phash)]
        algo: Algorithm,

        ///Output index file (CSV: path,fingerprint)
        #[arg(long, default_value = "index.csv")]
        out: PathBuf,

        ///Number of fingerprinting worker threads
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        threads: u32,

        ///Try every file regardless of extension
        #[arg(long)]
        any_file: bool,
    },

    ///Group near-duplicates from an index file
    Cluster {
        ///Index CSV produced by `hash`
        index: PathBuf,

        ///Hamming radius; members within this distance chain into one cluster
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(0..=64))]
        radius: u32,

        ///Output clusters file (CSV: clusterId,path)
        #[arg(long, default_value = "clusters.csv")]
        out: PathBuf,

        ///Also write clusters that contain no duplicates
        #[arg(long)]
        include_singletons: bool,
    },

    ///Rank each cluster's members and decide what to keep
    Plan {
        ///Clusters CSV produced by `cluster`
        clusters: PathBuf,

        ///Output plan file (CSV: clusterId,action,path,reason)
        #[arg(long, default_value = "plan.csv")]
        out: PathBuf,
    },

    ///Move every DELETE file from a plan into quarantine
    Apply {
        ///Plan CSV produced by `plan`
        plan: PathBuf,

        ///Folder duplicates are moved into; nothing is deleted in place
        #[arg(long, default_value = "./quarantine")]
        quarantine: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Hash {
            root,
            algo,
            out,
            threads,
            any_file,
        } => cmd_hash(&root, algo, &out, threads, any_file),
        Command::Cluster {
            index,
            radius,
            out,
            include_singletons,
        } => cmd_cluster(&index, radius, &out, include_singletons),
        Command::Plan { clusters, out } => cmd_plan(&clusters, &out),
        Command::Apply { plan, quarantine } => cmd_apply(&plan, &quarantine),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(exit_code(&e));
    }
}

//Exit codes follow the usual CLI convention: 0 ok, 1 runtime failure,
//2 bad usage (clap reports its own parse errors with 2 as well)
fn exit_code(e: &DedupeError) -> i32 {
    match e {
        DedupeError::UsageError(_) => 2,
        _ => 1,
    }
}

//Filter out invisible directories, but never the walk root itself
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

//Only allows file extensions that may be images
//Unless the user has elected to test every file
fn valid_file_extension(path: &Path, any_file: bool) -> bool {
    if any_file {
        return true;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(extension) => {
            let ext_lower = extension.to_lowercase();
            KNOWN_EXTENSIONS.contains(&ext_lower.as_str())
        }
        None => false,
    }
}

//Recursively gather candidate image files, sorted for a run-stable order
fn gather_file_list(root: &Path, any_file: bool) -> Vec<PathBuf> {
    let mut file_list: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Warn: Failed to read directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && valid_file_extension(path, any_file) {
            file_list.push(path.to_path_buf());
        }
    }

    file_list.sort();
    file_list
}

//Fingerprint every gathered file on a worker pool. The mpsc channel funnels
//results to this thread, which is the sole writer of the item set; one
//file's decode failure is reported and skipped, never fatal to the run.
fn run_fingerprinting(file_list: Vec<PathBuf>, algo: Algorithm, threads: u32) -> Vec<(String, u64)> {
    if file_list.is_empty() {
        //ThreadPool::new panics on a zero worker count
        return Vec::new();
    }

    let total = file_list.len() as u64;
    let num_threads = (threads as usize).min(file_list.len());

    let pool = ThreadPool::new(num_threads);
    let (tx, rx) = channel();
    for path in file_list {
        let tx = tx.clone();
        pool.execute(move || {
            let result = loader::fingerprint_file(&path, algo);
            //Send fails only when the receiver is gone and the run is over
            let _ = tx.send((path, result));
        });
    }
    drop(tx);

    let progress_bar = ProgressBar::new(total);
    let mut items: Vec<(String, u64)> = Vec::new();
    let mut error_list: Vec<DedupeError> = Vec::new();

    for (path, result) in rx {
        match result {
            Ok(hash) => items.push((path.to_string_lossy().into_owned(), hash)),
            Err(e) => {
                //Store the errors to print later, as printing them live disrupts the progress bar
                error_list.push(e);
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish();

    for e in error_list {
        eprintln!("{}", e);
    }

    //Channel arrival order depends on worker timing; sort for stable output
    items.sort_by(|a, b| a.0.cmp(&b.0));
    items
}

fn cmd_hash(
    root: &Path,
    algo: Algorithm,
    out: &Path,
    threads: u32,
    any_file: bool,
) -> Result<(), DedupeError> {
    if !root.exists() {
        return Err(DedupeError::UsageError(format!(
            "No such file or directory: {}",
            root.display()
        )));
    }

    let file_list = gather_file_list(root, any_file);
    let total = file_list.len();
    if total == 0 {
        eprintln!("Didn't find any image files under {}", root.display());
        return Ok(());
    }

    let items = run_fingerprinting(file_list, algo, threads);
    files::write_index(out, &items)?;
    println!(
        "Hashed {} of {} images with {} -> {}",
        items.len(),
        total,
        algo.name(),
        out.display()
    );
    Ok(())
}

fn cmd_cluster(
    index_path: &Path,
    radius: u32,
    out: &Path,
    include_singletons: bool,
) -> Result<(), DedupeError> {
    if !index_path.is_file() {
        return Err(DedupeError::UsageError(format!(
            "Index file not found: {}",
            index_path.display()
        )));
    }

    let items = files::read_index(index_path)?;

    //Build phase: sequential insertion; the tree is read-only from here on
    let mut tree = BkTree::new();
    for (id, hash) in &items {
        tree.insert(*hash, id.clone());
    }

    let clusters = cluster::build_clusters(&items, &tree, radius);
    files::write_clusters(out, &clusters, include_singletons)?;
    println!("Clusters: {} written -> {}", clusters.len(), out.display());
    Ok(())
}

fn cmd_plan(clusters_path: &Path, out: &Path) -> Result<(), DedupeError> {
    if !clusters_path.is_file() {
        return Err(DedupeError::UsageError(format!(
            "Clusters file not found: {}",
            clusters_path.display()
        )));
    }

    let groups = files::read_clusters(clusters_path)?;

    let mut entries = Vec::new();
    for (cluster_id, members) in &groups {
        entries.extend(plan::rank_and_plan(cluster_id, members, |id| {
            plan::probe_meta(Path::new(id))
        }));
    }

    files::write_plan(out, &entries)?;
    println!("Plan written -> {}", out.display());
    Ok(())
}

//Pick a quarantine destination that does not collide with anything already
//moved there, suffixing _1, _2, ... before the extension
fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let mut dest = dir.join(file_name);
    let (base, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot..]),
        _ => (file_name, ""),
    };
    let mut n = 1;
    while dest.exists() {
        dest = dir.join(format!("{}_{}{}", base, n, ext));
        n += 1;
    }
    dest
}

fn cmd_apply(plan_path: &Path, quarantine: &Path) -> Result<(), DedupeError> {
    if !plan_path.is_file() {
        return Err(DedupeError::UsageError(format!(
            "Plan file not found: {}",
            plan_path.display()
        )));
    }

    let entries = files::read_plan(plan_path)?;

    fs::create_dir_all(quarantine).map_err(|_| {
        DedupeError::FileError(format!(
            "Error: Failed to create quarantine folder: {}",
            quarantine.display()
        ))
    })?;

    let mut moved: u64 = 0;
    for entry in entries.iter().filter(|e| e.action == Action::Delete) {
        let src = Path::new(&entry.path);
        if !src.is_file() {
            eprintln!("Warn: Skipping missing file: {}", entry.path);
            continue;
        }
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "quarantined".to_string());
        let dest = unique_destination(quarantine, &name);
        match fs::rename(src, &dest) {
            Ok(()) => moved += 1,
            Err(e) => eprintln!(
                "Warn: Failed to move {} -> {}: {}",
                entry.path,
                dest.display(),
                e
            ),
        }
    }

    println!(
        "Apply completed: {} files moved. Review {}",
        moved,
        quarantine.display()
    );
    Ok(())
}
