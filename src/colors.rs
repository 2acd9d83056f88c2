/// ANSI color codes for line output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub key: &'static str,         // Cyan for field names
    pub equals: &'static str,      // White for = separator
    pub string: &'static str,      // Uncolored string values
    pub number: &'static str,      // Yellow for numbers
    pub boolean: &'static str,     // Magenta for true/false
    pub state_start: &'static str, // Yellow for instructions being entered
    pub state_done: &'static str,  // Green for finished instructions
    pub reset: &'static str,       // Reset to default color
}

impl ColorScheme {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                key: "\x1b[36m",
                equals: "\x1b[37m",
                string: "",
                number: "\x1b[33m",
                boolean: "\x1b[35m",
                state_start: "\x1b[33m",
                state_done: "\x1b[32m",
                reset: "\x1b[0m",
            }
        } else {
            // All empty strings for no-color mode
            Self {
                key: "",
                equals: "",
                string: "",
                number: "",
                boolean: "",
                state_start: "",
                state_done: "",
                reset: "",
            }
        }
    }
}

/// Colors are used only when writing to a terminal
pub fn should_use_colors() -> bool {
    use is_terminal::IsTerminal;
    std::io::stdout().is_terminal()
}
