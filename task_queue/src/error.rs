use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("store error: {}", source))]
    Store { source: fractal_store::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
