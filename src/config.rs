use std::env;

pub struct Config {
    pub no_color: bool,
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            no_color: env::var_os("NO_COLOR").is_some(),
            user_agent: env::var("HTTP_INFO_USER_AGENT")
                .ok()
                .filter(|ua| !ua.is_empty())
                .unwrap_or_else(default_user_agent),
        }
    }

    /// Command line flag wins over the environment, but never re-enables colors.
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color |= no_color;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            no_color: false,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("http-info/{}", env!("CARGO_PKG_VERSION"))
}
