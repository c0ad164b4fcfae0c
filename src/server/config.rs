use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Repeat views of a post by the same user within this many minutes do
    /// not count as a renewed view. A product policy knob, not a technical
    /// constant.
    pub view_window_minutes: u64,
    /// Directory of a built frontend to serve statically, if any.
    pub frontend_dir_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            view_window_minutes: 30,
            frontend_dir_path: None,
        }
    }
}
