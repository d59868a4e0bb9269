//! Single-image inspection and mutation tools, dispatched by the binary's
//! invocation name the way the teacher's `mutils` dispatches on `argv[0]`
//! (`src/main.rs`). Each subcommand opens one disk image, does its one
//! thing, and exits non-zero on any engine error.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::process::exit;

use ds3fs::block::{Disk, FileDisk};
use ds3fs::fs::FileSystem;
use ds3fs::inode::InodeType;
use ds3fs::layout::Superblock;
use ds3fs::{mkfs, path};

fn usage(bin: &str, args: &str) -> ! {
    eprintln!("{bin}: {args}");
    exit(1);
}

fn open_fs(image: &str) -> FileSystem<FileDisk> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(image)
        .unwrap_or_else(|e| die(&format!("cannot open {image}: {e}")));
    FileSystem::open(FileDisk::open(file)).unwrap_or_else(|e| die(&format!("bad image: {e}")))
}

fn die(msg: &str) -> ! {
    eprintln!("error: {msg}");
    exit(1);
}

fn main() {
    env_logger::init();
    let bin = env::args().next().unwrap_or_default();
    let bin = bin.rsplit('/').next().unwrap_or("ds3").to_owned();
    let args: Vec<String> = env::args().skip(1).collect();

    match bin.as_str() {
        "ds3bits" => bits(&args),
        "ds3cat" => cat(&args),
        "ds3cp" => cp(&args),
        "ds3ls" => ls(&args),
        "ds3mkdir" => mkdir(&args),
        "ds3mkfs" => mkfs_main(&args),
        other => usage(other, "unknown ds3 tool; invoke as ds3bits/ds3cat/ds3cp/ds3ls/ds3mkdir/ds3mkfs"),
    }
}

fn bits(args: &[String]) {
    let [image] = args else {
        usage("ds3bits", "diskImageFile");
    };
    let mut fs = open_fs(image);
    let sb = *fs.superblock();

    println!("Super");
    println!("inode_region_addr {}", sb.inode_region_addr);
    println!("inode_region_len {}", sb.inode_region_len);
    println!("num_inodes {}", sb.num_inodes);
    println!("data_region_addr {}", sb.data_region_addr);
    println!("data_region_len {}", sb.data_region_len);
    println!("num_data {}\n", sb.num_data);

    let inode_bitmap = read_region(fs.disk_mut(), sb.inode_bitmap_addr, sb.inode_bitmap_len);
    println!("Inode bitmap");
    let bytes = (sb.num_inodes as usize + 7) / 8;
    println!(
        "{}\n",
        inode_bitmap[..bytes]
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let data_bitmap = read_region(fs.disk_mut(), sb.data_bitmap_addr, sb.data_bitmap_len);
    println!("Data bitmap");
    let bytes = (sb.num_data as usize + 7) / 8;
    println!(
        "{}",
        data_bitmap[..bytes]
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
}

fn read_region<D: Disk>(disk: &mut D, addr: u32, len: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len as usize * ds3fs::block::BLOCK_SIZE);
    for i in 0..len {
        out.extend_from_slice(&disk.read_block(addr + i).unwrap_or_else(|e| die(&e.to_string())));
    }
    out
}

fn cat(args: &[String]) {
    let [image, inum] = args else {
        usage("ds3cat", "diskImageFile inodeNumber");
    };
    let inum: u32 = inum.parse().unwrap_or_else(|_| die("inodeNumber must be an integer"));
    let mut fs = open_fs(image);

    let inode = fs.stat(inum).unwrap_or_else(|_| die("Error reading file"));
    if inode.kind == InodeType::Directory {
        die("Error reading file");
    }

    println!("File blocks");
    for i in 0..inode.block_count() {
        println!("{}", inode.direct[i]);
    }
    println!();

    let mut buf = vec![0u8; inode.size as usize];
    fs.read(inum, &mut buf, inode.size as usize)
        .unwrap_or_else(|_| die("Error reading file"));

    println!("File data");
    std::io::stdout().write_all(&buf).unwrap_or_else(|e| die(&e.to_string()));
}

fn cp(args: &[String]) {
    let [image, src, dst_inode] = args else {
        usage("ds3cp", "diskImageFile src_file dst_inode");
    };
    let dst: u32 = dst_inode.parse().unwrap_or_else(|_| die("dst_inode must be an integer"));
    let data = std::fs::read(src).unwrap_or_else(|_| die("Could not open source file"));
    let mut fs = open_fs(image);

    fs.disk_mut().begin_transaction();
    match fs.write(dst, &data, data.len()) {
        Ok(_) => fs.disk_mut().commit(),
        Err(_) => {
            let _ = fs.disk_mut().rollback();
            die("Could not write to dst_file");
        }
    }
}

fn ls(args: &[String]) {
    let [image, target] = args else {
        usage("ds3ls", "diskImageFile directory");
    };
    let mut fs = open_fs(image);

    let inum = path::resolve(&mut fs, target).unwrap_or_else(|_| die("Directory not found"));
    let inode = fs.stat(inum).unwrap_or_else(|_| die("Directory not found"));

    match inode.kind {
        InodeType::Directory => {
            let mut entries = fs.list_dir(inum).unwrap_or_else(|_| die("Directory not found"));
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, is_dir) in entries {
                let child = fs.lookup(inum, &name).unwrap();
                let name = if is_dir { format!("{name}/") } else { name };
                println!("{child}\t{name}");
            }
        }
        InodeType::Regular => {
            let name = path::tokenize(target).last().copied().unwrap_or(target);
            println!("{inum}\t{name}");
        }
        InodeType::Free => die("Directory not found"),
    }
}

fn mkdir(args: &[String]) {
    let [image, parent, name] = args else {
        usage("ds3mkdir", "diskImageFile parentInode directory");
    };
    let parent: u32 = parent.parse().unwrap_or_else(|_| die("parentInode must be an integer"));
    let mut fs = open_fs(image);

    fs.disk_mut().begin_transaction();
    match fs.create_dir(parent, name) {
        Ok(_) => fs.disk_mut().commit(),
        Err(_) => {
            let _ = fs.disk_mut().rollback();
            die("Error creating directory");
        }
    }
}

fn mkfs_main(args: &[String]) {
    let [image, num_inodes, num_data] = args else {
        usage("ds3mkfs", "diskImageFile numInodes numDataBlocks");
    };
    let num_inodes: u32 = num_inodes.parse().unwrap_or_else(|_| die("numInodes must be an integer"));
    let num_data: u32 = num_data.parse().unwrap_or_else(|_| die("numDataBlocks must be an integer"));

    let sb = Superblock::layout(num_inodes, num_data);
    let size = sb.total_blocks() as u64 * ds3fs::block::BLOCK_SIZE as u64;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)
        .unwrap_or_else(|e| die(&format!("cannot create {image}: {e}")));
    file.set_len(size).unwrap_or_else(|e| die(&e.to_string()));

    let mut disk = FileDisk::open(file);
    mkfs::format(&mut disk, &sb).unwrap_or_else(|e| die(&e.to_string()));
}
