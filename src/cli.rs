pub const BACKFILL_USAGE: &str = "usage: automkt-backfill [--limit <N>]";

/// Parses the backfill arguments. `Ok(None)` means no limit was given; `Err` carries
/// a message for stderr (empty for `--help`).
pub fn parse_limit_arg<I, S>(args: I) -> std::result::Result<Option<usize>, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut limit = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        let value = if arg == "--limit" {
            match args.next() {
                Some(value) => value.as_ref().to_string(),
                None => return Err("--limit requires a value".to_string()),
            }
        } else if let Some(value) = arg.strip_prefix("--limit=") {
            value.to_string()
        } else if arg == "-h" || arg == "--help" {
            return Err(String::new());
        } else {
            return Err(format!("unexpected argument '{}'", arg));
        };

        let parsed = value
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid --limit value '{}'", value))?;
        limit = Some(parsed);
    }

    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_means_no_override() {
        assert_eq!(parse_limit_arg(Vec::<String>::new()), Ok(None));
    }

    #[test]
    fn separate_and_inline_values() {
        assert_eq!(parse_limit_arg(["--limit", "3"]), Ok(Some(3)));
        assert_eq!(parse_limit_arg(["--limit=7"]), Ok(Some(7)));
        assert_eq!(parse_limit_arg(["--limit", "0"]), Ok(Some(0)));
    }

    #[test]
    fn last_limit_wins() {
        assert_eq!(parse_limit_arg(["--limit", "3", "--limit=9"]), Ok(Some(9)));
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(parse_limit_arg(["--limit"]).is_err());
        assert!(parse_limit_arg(["--limit", "many"]).is_err());
        assert!(parse_limit_arg(["--limit=-1"]).is_err());
        assert!(parse_limit_arg(["--verbose"]).is_err());
        assert_eq!(parse_limit_arg(["--help"]), Err(String::new()));
    }
}
