use snafu::Snafu;

/// Errors the Store surfaces to callers directly.
/// Batch operations never return these for a single bad element — those
/// are partitioned into a `ResponseMeta` instead.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("store transport error: {}", source))]
    Sqlx { source: sqlx::Error },

    #[snafu(display("malformed stored payload: {}", source))]
    Serde { source: serde_json::Error },

    #[snafu(display("'{}' is not a valid id: {}", value, source))]
    InvalidId { value: String, source: uuid::Error },

    #[snafu(display(
        "hash collision: payload hashes to an existing molecule_hash but does not match its stored payload"
    ))]
    HashCollision,

    #[snafu(display("no {} found with id {}", kind, id))]
    MissingReference { kind: &'static str, id: String },

    #[snafu(display(
        "connected database reports schema version {}, this build requires at least {}",
        found,
        required
    ))]
    UnsupportedSchemaVersion { found: i64, required: i64 },

    #[snafu(display("bcrypt error: {}", source))]
    Bcrypt { source: bcrypt::BcryptError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
