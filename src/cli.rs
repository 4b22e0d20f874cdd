use chrono::NaiveDate;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "merchan-report",
    version,
    about = "Daily merchandising route-adherence report, delivered over WhatsApp"
)]
pub struct Cli {
    /// Simulate the run as if today were this date (YYYY-MM-DD)
    #[arg(long = "data", value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Preview the messages instead of sending them
    #[arg(long = "teste", default_value_t = false)]
    pub preview: bool,

    /// Only produce the executive report (Mondays)
    #[arg(long = "somente-diretoria", default_value_t = false)]
    pub executive_only: bool,

    /// Accepted for compatibility with older schedules; sending is controlled by MODO_TESTE
    #[arg(long = "enviar", default_value_t = false, hide = true)]
    pub send: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "merchan-report",
            "--data",
            "2026-01-12",
            "--teste",
            "--somente-diretoria",
            "--enviar",
        ])
        .unwrap();

        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2026, 1, 12));
        assert!(cli.preview);
        assert!(cli.executive_only);
        assert!(cli.send);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["merchan-report"]).unwrap();
        assert!(cli.date.is_none());
        assert!(!cli.preview);
        assert!(!cli.executive_only);
    }

    #[test]
    fn test_rejects_malformed_date() {
        assert!(Cli::try_parse_from(["merchan-report", "--data", "12/01/2026"]).is_err());
    }
}
