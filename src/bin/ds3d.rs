//! A minimal HTTP-like daemon exposing one image under the `/ds3/` prefix.
//! Single-threaded, blocking accept loop, one request handled at a time —
//! matching the single-mutator assumption the transaction scope in
//! [`ds3fs::block::Disk`] relies on. Grounded in
//! `DistributedFileSystemService.cpp`'s `get`/`put`/`del` routing; the HTTP
//! framework itself (`tiny_http`) has no counterpart in the teacher and was
//! picked fresh for its synchronous, single-threaded server loop.

use std::env;
use std::fs::OpenOptions;
use std::io::Read;
use std::process::exit;

use log::{error, info, warn};
use tiny_http::{Method, Response, Server};

use ds3fs::block::FileDisk;
use ds3fs::fs::FileSystem;
use ds3fs::service::{self, Listing, Status};

const PREFIX: &str = "/ds3/";

fn status_code(status: Status) -> u16 {
    match status {
        Status::NotFound => 404,
        Status::Conflict => 409,
        Status::BadRequest => 400,
    }
}

fn request_path(url: &str) -> Option<&str> {
    url.strip_prefix(PREFIX)
}

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let image = args.next().unwrap_or_else(|| {
        eprintln!("ds3d: diskImageFile [bind_address]");
        exit(1);
    });
    let bind = args.next().unwrap_or_else(|| "127.0.0.1:8080".to_owned());

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&image)
        .unwrap_or_else(|e| {
            eprintln!("ds3d: cannot open {image}: {e}");
            exit(1);
        });
    let mut fs = FileSystem::open(FileDisk::open(file)).unwrap_or_else(|e| {
        eprintln!("ds3d: bad image {image}: {e}");
        exit(1);
    });

    let server = Server::http(&bind).unwrap_or_else(|e| {
        eprintln!("ds3d: cannot bind {bind}: {e}");
        exit(1);
    });
    info!("serving {image} on {bind}{PREFIX}");

    for mut request in server.incoming_requests() {
        let url = request.url().to_owned();
        let Some(path) = request_path(&url) else {
            warn!("request outside {PREFIX}: {url}");
            let _ = request.respond(Response::empty(404));
            continue;
        };

        let method = request.method().clone();
        let result = match method {
            Method::Get => match service::get(&mut fs, path) {
                Ok(Listing::Directory(text)) => Ok(text.into_bytes()),
                Ok(Listing::File(bytes)) => Ok(bytes),
                Err(status) => Err(status),
            },
            Method::Put => {
                let mut body = Vec::new();
                if let Err(e) = request.as_reader().read_to_end(&mut body) {
                    error!("failed to read request body: {e}");
                    let _ = request.respond(Response::empty(400));
                    continue;
                }
                service::put(&mut fs, path, &body).map(|()| Vec::new())
            }
            Method::Delete => service::delete(&mut fs, path).map(|()| Vec::new()),
            _ => {
                let _ = request.respond(Response::empty(405));
                continue;
            }
        };

        match result {
            Ok(body) => {
                let _ = request.respond(Response::from_data(body).with_status_code(200));
            }
            Err(status) => {
                info!("{method:?} {path} -> {status:?}");
                let _ = request.respond(Response::empty(status_code(status)));
            }
        }
    }
}
