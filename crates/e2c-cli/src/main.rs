#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use e2c_core::Ext2Fs;
use e2c_error::Ext2Error;
use serde::Serialize;
use std::env;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct InspectOutput {
    block_size: u32,
    blocks_count: u32,
    inodes_count: u32,
    inode_size: u32,
    groups_count: u32,
    first_ino: u32,
    volume_name: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        // Filesystem failures exit with their errno so scripts can tell a
        // missing path (ENOENT) from a broken image (EIO/EINVAL).
        let code = error
            .downcast_ref::<Ext2Error>()
            .map_or(1, Ext2Error::to_errno);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "cat" => {
            let (image, path) = image_and_path(&mut args, "cat")?;
            cat(Path::new(&image), &path)
        }
        "resolve" => {
            let (image, path) = image_and_path(&mut args, "resolve")?;
            resolve(Path::new(&image), &path)
        }
        "ls" => {
            let (image, path) = image_and_path(&mut args, "ls")?;
            ls(Path::new(&image), &path)
        }
        "inspect" => {
            let Some(image) = args.next() else {
                bail!("inspect requires an image argument");
            };
            let json = args.any(|arg| arg == "--json");
            inspect(Path::new(&image), json)
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn image_and_path(args: &mut impl Iterator<Item = String>, command: &str) -> Result<(String, String)> {
    let Some(image) = args.next() else {
        bail!("{command} requires <image> <path>");
    };
    let Some(path) = args.next() else {
        bail!("{command} requires <image> <path>");
    };
    Ok((image, path))
}

fn print_usage() {
    println!("e2c-cli\n");
    println!("USAGE:");
    println!("  e2c-cli cat <image> <path>");
    println!("  e2c-cli resolve <image> <path>");
    println!("  e2c-cli ls <image> <path>");
    println!("  e2c-cli inspect <image> [--json]");
}

fn open_image(image: &Path) -> Result<Ext2Fs> {
    Ext2Fs::open(image).with_context(|| format!("failed to open ext2 image {}", image.display()))
}

fn cat(image: &Path, path: &str) -> Result<()> {
    let fs = open_image(image)?;
    let data = fs.read_file(path)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(&data).context("write to stdout")?;
    out.flush().context("flush stdout")?;
    Ok(())
}

fn resolve(image: &Path, path: &str) -> Result<()> {
    let fs = open_image(image)?;
    let (ino, _) = fs.resolve_path(path)?;
    println!("{ino}");
    Ok(())
}

fn ls(image: &Path, path: &str) -> Result<()> {
    let fs = open_image(image)?;
    let entries = fs.read_dir(path)?;
    for entry in entries {
        println!("{} {:>8}  {}", entry.file_type.tag(), entry.inode, entry.name_str());
    }
    Ok(())
}

fn inspect(image: &Path, json: bool) -> Result<()> {
    let fs = open_image(image)?;
    let geom = fs.geometry();

    let output = InspectOutput {
        block_size: geom.block_size,
        blocks_count: geom.blocks_count,
        inodes_count: geom.inodes_count,
        inode_size: geom.inode_size,
        groups_count: geom.groups_count,
        first_ino: geom.first_ino,
        volume_name: geom.volume_name.clone(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
    } else {
        println!("filesystem: ext2");
        println!("block_size: {}", output.block_size);
        println!("blocks_count: {}", output.blocks_count);
        println!("inodes_count: {}", output.inodes_count);
        println!("inode_size: {}", output.inode_size);
        println!("groups_count: {}", output.groups_count);
        println!("first_ino: {}", output.first_ino);
        println!("volume_name: {}", output.volume_name);
    }
    Ok(())
}
