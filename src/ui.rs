use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{}/{}]", num, total).blue().bold(), msg);
}

/// Show the changed lines between two versions of a file
pub fn diff(old: &str, new: &str) {
    let changes = diff_lines(old, new);
    if changes.is_empty() {
        println!("    {}", "(no changes)".dimmed());
        return;
    }
    for (tag, line) in changes {
        match tag {
            '-' => println!("    {}", format!("- {line}").red()),
            _ => println!("    {}", format!("+ {line}").green()),
        }
    }
}

/// Inserted (`+`) and deleted (`-`) lines, in diff order
pub fn diff_lines(old: &str, new: &str) -> Vec<(char, String)> {
    let diff = similar::TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .filter_map(|change| {
            let line = change.value().trim_end_matches(['\n', '\r']).to_string();
            match change.tag() {
                similar::ChangeTag::Delete => Some(('-', line)),
                similar::ChangeTag::Insert => Some(('+', line)),
                similar::ChangeTag::Equal => None,
            }
        })
        .collect()
}

/// Print the vpskit banner
pub fn banner() {
    println!(
        "{}",
        r"
  __   ___ __  ___| | _(_) |_
  \ \ / / '_ \/ __| |/ / | __|
   \ V /| |_) \__ \   <| | |_
    \_/ | .__/|___/_|\_\_|\__|
        |_|
"
        .cyan()
    );
}
