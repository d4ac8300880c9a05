use crate::error::Error;
use ::sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Stream the full content of `file` through SHA-1 and return the lowercase
/// hex digest. This is the sample key the analyzer knows files by.
///
/// A file that vanished or became unreadable since the walk yields
/// [`Error::Fingerprint`].
pub fn fingerprint(file: &Path) -> Result<String, Error> {
    let to_error = |source: io::Error| Error::Fingerprint {
        path: file.to_path_buf(),
        source,
    };
    let f = File::open(file).map_err(to_error)?;
    hash_reader(f).map_err(to_error)
}

pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_data(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}
