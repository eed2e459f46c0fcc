/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    SysInfo,
    Clear,
    ChangeModel,
    Prompt(String),
    Empty,
}

impl Command {
    /// Keywords match case-insensitively after trimming; anything else that is
    /// not blank is a prompt for the model.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        match line.to_lowercase().as_str() {
            "exit" | "quit" | "bye" => Command::Exit,
            "help" => Command::Help,
            "sysinfo" => Command::SysInfo,
            "clear" => Command::Clear,
            "chmodel" => Command::ChangeModel,
            _ => Command::Prompt(line.to_string()),
        }
    }
}
