use std::path::PathBuf;

error_chain::error_chain! {
    errors {
        LoadGraph(path: PathBuf) {
            description("graph file load error")
            display("failed to read graph file '{}'", path.to_string_lossy())
        }
        TruncatedGraph(path: PathBuf) {
            description("graph file truncated")
            display("graph file '{}' has a truncated integer sequence", path.to_string_lossy())
        }
        MissingParameter(name: &'static str) {
            description("missing request parameter")
            display("missing required parameter '{}'", name)
        }
        InvalidCategoryId(id: i32) {
            description("invalid category id")
            display("id {} is not a valid entity in the graph", id)
        }
        UnknownAction(value: String) {
            description("unknown action parameter")
            display("unknown action '{}', expected one of and|not|list|path", value)
        }
        InvalidParameter(name: &'static str, value: String) {
            description("malformed request parameter")
            display("parameter '{}' has an invalid value '{}'", name, value)
        }
        SelfPath {
            description("path request with identical endpoints")
            display("a path request requires distinct c1 and c2")
        }
        QueueFull {
            description("job queue is at capacity")
            display("the job queue is full, try again later")
        }
    }
}
