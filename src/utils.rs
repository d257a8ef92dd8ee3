use crate::observer::GenerationReport;

/// `info!` that strips ANSI colour sequences unless `$colorful` is true
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)+) => {{
        let line = format!($($arg)+);
        if $colorful {
            log::info!("{}", line);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&line));
        }
    }};
}

/// Remove `ESC[...m` colour sequences
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Header printed once before the generation lines
pub fn display_generation_legend(mode: &str, n_gen: usize) -> String {
    format!(
        "\x1b[1;97m{}\x1b[0m over {} generation(s) | \x1b[1;92mMAE\x1b[0m | \x1b[0;96mRMSE\x1b[0m | complexity | configuration",
        mode, n_gen
    )
}

/// One line per completed generation, with a progress bar
pub fn display_generation(report: &GenerationReport, n_gen: usize) -> String {
    let width = 20;
    let done = if n_gen > 0 {
        ((report.generation + 1) * width / n_gen).min(width)
    } else {
        width
    };
    let bar = format!("{}{}", "█".repeat(done), "░".repeat(width - done));
    let front = match report.front_size {
        Some(n) => format!(" | front {}", n),
        None => String::new(),
    };
    format!(
        "#{:<4} {} \x1b[1;92m{:.4}\x1b[0m | \x1b[0;96m{:.4}\x1b[0m | {:<5} | {}{}",
        report.generation, bar, report.mae, report.rmse, report.complexity, report.description, front
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;92m0.1234\x1b[0m | x"), "0.1234 | x");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_display_generation() {
        let report = GenerationReport {
            generation: 1,
            mae: 0.5,
            rmse: 0.75,
            std_mae: 0.01,
            complexity: 3,
            description: "[a, b, c]".to_string(),
            front_size: Some(4),
        };
        let line = strip_ansi(&display_generation(&report, 4));
        assert!(line.starts_with("#1"));
        assert!(line.contains("0.5000"));
        assert!(line.contains("0.7500"));
        assert!(line.ends_with("[a, b, c] | front 4"));
        assert_eq!(line.matches('█').count(), 10);
    }
}
