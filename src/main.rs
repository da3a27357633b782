use amortization::{
    Engine, LoanError, LoanResult, LoanTerms, PaymentRecord, PaymentTable, PrepaymentPolicy,
    RateType,
};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, ValueEnum};
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{process, str::FromStr};

/// Prints the payment table of an installment loan
#[derive(Parser, Debug)]
#[command(name = "amortization", version)]
struct Cli {
    /// Loan amount in minor currency units
    #[arg(short = 'a', long, default_value_t = 30_000_000)]
    amount: i64,

    /// Term in years [default: 35, or 0 when --months is given]
    #[arg(short = 'y', long)]
    years: Option<i32>,

    /// Term in months, added to the years
    #[arg(short = 'm', long, default_value_t = 0)]
    months: i32,

    /// Annual rate as a decimal (0.01 = 1%)
    #[arg(short = 'r', long, default_value_t = 0.01)]
    rate: f64,

    /// Amortization engine
    #[arg(long, value_enum, default_value = "standard")]
    engine: EngineArg,

    /// What a prepayment does to the rest of the schedule
    #[arg(long, value_enum, default_value = "duration")]
    policy: PolicyArg,

    /// Fixed-rate loan; rate changes are rejected
    #[arg(long)]
    fixed: bool,

    /// New rate from an installment on, e.g. 13:0.04 (repeatable)
    #[arg(long = "change-rate", value_name = "INSTALLMENT:RATE")]
    rate_changes: Vec<RateChange>,

    /// Extra principal payment at an installment, e.g. 12:3000000 (repeatable)
    #[arg(long = "prepay", value_name = "INSTALLMENT:AMOUNT")]
    prepayments: Vec<Prepayment>,

    /// Due date of the first installment
    #[arg(long, value_name = "YYYY-MM-DD")]
    first_payment: Option<NaiveDate>,

    /// Tab-separated output
    #[arg(long)]
    tsv: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineArg {
    Standard,
    Simple,
    EqualPrincipal,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Standard => Engine::StandardAmortized,
            EngineArg::Simple => Engine::SimpleAmortized,
            EngineArg::EqualPrincipal => Engine::EqualPrincipal,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Duration,
    Amount,
}

impl From<PolicyArg> for PrepaymentPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Duration => PrepaymentPolicy::ShortenDuration,
            PolicyArg::Amount => PrepaymentPolicy::ReduceAmount,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct RateChange {
    index: usize,
    rate: f64,
}

impl FromStr for RateChange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (installment, rate) = s
            .split_once(':')
            .ok_or_else(|| format!("expected INSTALLMENT:RATE, got '{}'", s))?;
        Ok(Self {
            index: parse_installment(installment)?,
            rate: rate
                .trim()
                .parse()
                .map_err(|e| format!("bad rate '{}': {}", rate, e))?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Prepayment {
    index: usize,
    amount: i64,
}

impl FromStr for Prepayment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (installment, amount) = s
            .split_once(':')
            .ok_or_else(|| format!("expected INSTALLMENT:AMOUNT, got '{}'", s))?;
        Ok(Self {
            index: parse_installment(installment)?,
            amount: amount
                .trim()
                .parse()
                .map_err(|e| format!("bad amount '{}': {}", amount, e))?,
        })
    }
}

// installments are numbered from 1 on the command line, as in the printout
fn parse_installment(s: &str) -> Result<usize, String> {
    let number: usize = s
        .trim()
        .parse()
        .map_err(|e| format!("bad installment '{}': {}", s, e))?;
    number
        .checked_sub(1)
        .ok_or_else(|| "installments are numbered from 1".to_string())
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run(cli: &Cli) -> Result<(), LoanError> {
    let years = cli.years.unwrap_or(if cli.months > 0 { 0 } else { 35 });
    let engine = Engine::from(cli.engine);
    let rate_type = if cli.fixed {
        RateType::Fixed
    } else {
        RateType::Variable
    };

    let mut terms = LoanTerms::new(
        cli.amount,
        years,
        cli.months,
        cli.rate,
        rate_type,
        engine.method(),
        cli.policy.into(),
    )?;
    if let Some(date) = cli.first_payment {
        terms = terms.with_first_payment_date(date);
    }
    info!("{}", terms);

    let mut table = PaymentTable::with_engine(terms, engine)?;
    for change in &cli.rate_changes {
        table.change_rate(change.index, change.rate)?;
    }
    for prepayment in &cli.prepayments {
        table.prepayment(prepayment.index, prepayment.amount)?;
    }

    let result = table.get_result()?;
    if cli.tsv {
        print_tsv(&table, &result);
    } else {
        print_table(&table, &result);
    }
    Ok(())
}

fn print_table(table: &PaymentTable, result: &LoanResult) {
    println!(
        "{:>4} {:>10} {:>7} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11}",
        "#",
        "date",
        "rate",
        "principal",
        "interest",
        "accr. paid",
        "prepayment",
        "total",
        "balance",
        "accr. new",
        "accr. bal"
    );
    for r in table {
        println!("{}", format_row(r));
    }

    let terms = table.terms();
    println!();
    println!("engine      {}", table.engine());
    println!("terms       {}", terms);
    println!("principal   {:>13}", result.principal);
    println!("interest    {:>13}", result.interest);
    println!("accr. paid  {:>13}", result.accrued_interest_paid);
    println!("prepayment  {:>13}", result.prepayment);
    println!("total       {:>13}", result.total);
    println!("balance     {:>13}", result.balance);
    println!("accr. bal   {:>13}", result.accrued_interest_balance);
    match table.payoff_index() {
        Some(i) if i + 1 < table.size() => println!("paid off    {:>13}", i + 1),
        Some(_) => {}
        None => println!("not paid off"),
    }
}

fn format_row(r: &PaymentRecord) -> String {
    let date = r.due_date.map(|d| d.to_string()).unwrap_or_default();
    format!(
        "{:>4} {:>10} {:>6.3}% {:>11} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11} {:>11}",
        r.index + 1,
        date,
        r.rate * 100.,
        r.principal,
        r.interest,
        r.accrued_interest_paid,
        r.prepayment,
        r.total,
        r.balance,
        r.accrued_interest_new,
        r.accrued_interest_balance
    )
}

fn print_tsv(table: &PaymentTable, result: &LoanResult) {
    let terms = table.terms();
    println!("amount\trate\tmethod\tinstallments");
    println!(
        "{}\t{:.3}%\t{}\t{}",
        terms.amount(),
        terms.annual_rate() * 100.,
        terms.method(),
        terms.installments()
    );
    println!();
    println!("principal\tinterest\taccrued interest paid\tprepayment\ttotal\tbalance\taccrued interest balance");
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        result.principal,
        result.interest,
        result.accrued_interest_paid,
        result.prepayment,
        result.total,
        result.balance,
        result.accrued_interest_balance
    );
    println!();
    println!("installment\tdate\trate\tprincipal\tinterest\taccrued interest paid\tprepayment\ttotal\tbalance\taccrued interest new\taccrued interest balance");
    for r in table {
        println!(
            "{}\t{}\t{:.3}%\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.index + 1,
            r.due_date.map(|d| d.to_string()).unwrap_or_default(),
            r.rate * 100.,
            r.principal,
            r.interest,
            r.accrued_interest_paid,
            r.prepayment,
            r.total,
            r.balance,
            r.accrued_interest_new,
            r.accrued_interest_balance
        );
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = SimpleLogger::new().with_level(log_level(cli.verbose)).init() {
        eprintln!("logger not installed: {}", e);
    }

    if let Err(e) = run(&cli) {
        error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_installment, Cli, Prepayment, RateChange};
    use amortization::{LoanResult, PaymentRecord, PaymentTable};
    use clap::{CommandFactory, Parser};
    use test_log::test;

    // verifies that types can implement the gated traits below
    fn is_normal<T: Sized + Send + Sync + Unpin>() {}

    #[test]
    fn normal_types() {
        is_normal::<PaymentRecord>();
        is_normal::<PaymentTable>();
        is_normal::<LoanResult>();
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_events() {
        assert_eq!("13:0.04".parse::<RateChange>(), Ok(RateChange { index: 12, rate: 0.04 }));
        assert_eq!("418:200000".parse::<Prepayment>(), Ok(Prepayment { index: 417, amount: 200_000 }));
        assert!("13".parse::<RateChange>().is_err());
        assert!("x:0.04".parse::<RateChange>().is_err());
        assert!("12:abc".parse::<Prepayment>().is_err());
        assert!(parse_installment("0").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["amortization"]).unwrap();
        assert_eq!(cli.amount, 30_000_000);
        assert_eq!(cli.years, None);
        assert_eq!(cli.rate, 0.01);
        assert!(cli.rate_changes.is_empty());

        let cli = Cli::try_parse_from([
            "amortization",
            "-a",
            "1000000",
            "-m",
            "6",
            "--engine",
            "equal-principal",
            "--prepay",
            "2:1000",
            "--prepay",
            "3:500",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.months, 6);
        assert_eq!(cli.prepayments.len(), 2);
        assert_eq!(cli.verbose, 2);

        assert!(Cli::try_parse_from(["amortization", "--engine", "balloon"]).is_err());
    }
}
