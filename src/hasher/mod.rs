pub mod sha1;

pub use self::sha1::fingerprint;
