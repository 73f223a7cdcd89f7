use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExtractError {
    #[snafu(display("Workload containers are not an array"))]
    NotAnArray,

    #[snafu(display("Workload container #{index} is not a mapping"))]
    NotAMapping { index: usize },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    #[snafu(display("Failed to decode object as JSON, error: {source}"))]
    Json { source: serde_json::Error },

    #[snafu(display("Failed to convert YAML object to JSON, error: {source}"))]
    Yaml { source: serde_yaml::Error },
}
