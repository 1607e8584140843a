use std::fmt;
use std::time::Duration;

/// Agent address used until the user configures another one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Upper bound for a single HTTP call to the agent.
///
/// Exceeding it is reported exactly like an unreachable host.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Envelope `code` the agent uses for successful responses.
pub const SUCCESS_CODE: i64 = 0;

/// `data.status` value reported by a healthy agent.
pub const HEALTH_OK: &str = "ok";

/// HTTP method of an agent route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Endpoints exposed by the agent's embedded web server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Health,
    Stats,
    Leaks,
    LeakReport,
    FdStats,
    FdLeaks,
    FdLeakReport,
    Reset,
}

impl Route {
    /// Every route, in the order the agent documents them.
    pub const ALL: [Route; 8] = [
        Route::Health,
        Route::Stats,
        Route::Leaks,
        Route::LeakReport,
        Route::FdStats,
        Route::FdLeaks,
        Route::FdLeakReport,
        Route::Reset,
    ];

    /// Path relative to the agent base URL.
    pub fn path(self) -> &'static str {
        match self {
            Route::Health => "/api/health",
            Route::Stats => "/api/stats",
            Route::Leaks => "/api/leaks",
            Route::LeakReport => "/api/leak-report",
            Route::FdStats => "/api/fd-stats",
            Route::FdLeaks => "/api/fd-leaks",
            Route::FdLeakReport => "/api/fd-leak-report",
            Route::Reset => "/api/reset",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Route::Reset => Method::Post,
            _ => Method::Get,
        }
    }

    /// Looks a route up by its path, ignoring any query string.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split('?').next().unwrap_or(path);
        Route::ALL.into_iter().find(|r| r.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.method() {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        write!(f, "{method} {}", self.path())
    }
}
