use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;

use super::format::{format_amount, parse_amount};
use crate::db::Database;
use crate::models::{Allocation, Budget, BudgetPeriod, Category, Expense};
use crate::reset::{ConsoleNotifier, GateState, ResetController, ResetTransaction};

pub(crate) fn as_cli(args: &[String], db: &mut Database) -> Result<()> {
    match args[1].as_str() {
        "init" => cli_init(&args[2..], db),
        "budgets" => cli_budgets(db),
        "status" | "s" => cli_status(&args[2..], db),
        "allocate" => cli_allocate(&args[2..], db),
        "spend" => cli_spend(&args[2..], db),
        "reset" => cli_reset(&args[2..], db),
        "history" => cli_history(&args[2..], db),
        "export" => cli_export(&args[2..], db),
        "categories" => cli_categories(db),
        "add-category" => cli_add_category(&args[2..], db),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("budget-rollover {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

pub(crate) fn print_usage() {
    println!("budget-rollover: close out a budget period and start the next one");
    println!();
    println!("Usage: budget-rollover <command>");
    println!();
    println!("Commands:");
    println!("  init <name> <YYYY-MM> <income>    Start a new budget");
    println!("  budgets                           List budgets");
    println!("  status                            Show the active period's balance");
    println!("  allocate <category> <amount>      Allocate money to a category");
    println!("  spend <category> <amount> [desc]  Record an expense");
    println!("  reset <income>                    Archive the active period and start the next");
    println!("    --rollover yes|no               Add the remaining balance to the new income");
    println!("  history                           List periods and rollovers");
    println!("  export <period_id> [path]         Export a period's records to CSV");
    println!("  categories                        List categories");
    println!("  add-category <name>               Add a category");
    println!("  --help, -h                        Show this help");
    println!("  --version, -V                     Show version");
    println!();
    println!("Options:");
    println!("  --budget <id>                     Budget to act on (default: first budget)");
}

// ── Argument helpers ─────────────────────────────────────────

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

/// Arguments with `--flag value` pairs removed.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn select_budget(args: &[String], db: &Database) -> Result<Budget> {
    let budgets = db.get_budgets()?;
    if let Some(raw) = flag_value(args, "--budget") {
        let id: i64 = raw
            .parse()
            .with_context(|| format!("Invalid budget id: {raw}"))?;
        return budgets
            .into_iter()
            .find(|b| b.id == Some(id))
            .ok_or_else(|| anyhow::anyhow!("Budget {id} not found"));
    }
    budgets
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No budgets yet. Create one with: budget-rollover init <name> <YYYY-MM> <income>"))
}

fn active_period(budget: &Budget, db: &Database) -> Result<(i64, BudgetPeriod)> {
    let budget_id = budget
        .id
        .ok_or_else(|| anyhow::anyhow!("Budget has no ID"))?;
    let period = db
        .get_active_period(budget_id)?
        .ok_or_else(|| anyhow::anyhow!("Budget '{budget}' has no active period"))?;
    let period_id = period
        .id
        .ok_or_else(|| anyhow::anyhow!("Period has no ID"))?;
    Ok((period_id, period))
}

fn resolve_category(name: &str, db: &Database) -> Result<i64> {
    let categories = db.get_categories()?;
    Category::find_by_name(&categories, name)
        .and_then(|c| c.id)
        .ok_or_else(|| anyhow::anyhow!("Category '{name}' not found. See: budget-rollover categories"))
}

// ── Commands ─────────────────────────────────────────────────

fn cli_init(args: &[String], db: &mut Database) -> Result<()> {
    let pos = positional(args);
    let [name, month, income] = pos.as_slice() else {
        anyhow::bail!("Usage: budget-rollover init <name> <YYYY-MM> <income>");
    };
    let income = ResetTransaction::parse_income(income)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let (budget_id, _) = db.create_budget(name, month, income)?;
    println!(
        "Created budget '{name}' (id {budget_id}) for {month} with income {}",
        format_amount(income)
    );
    Ok(())
}

fn cli_budgets(db: &mut Database) -> Result<()> {
    let budgets = db.get_budgets()?;
    if budgets.is_empty() {
        println!("No budgets");
        return Ok(());
    }

    println!("{:<4} {:<24} {:<10} Income", "ID", "Name", "Month");
    println!("{}", "─".repeat(55));
    for budget in &budgets {
        let id = budget.id.unwrap_or(0);
        let (month, income) = match db.get_active_period(id)? {
            Some(p) => (p.month, format_amount(p.income)),
            None => ("-".into(), "-".into()),
        };
        println!("{:<4} {:<24} {:<10} {}", id, budget.name, month, income);
    }
    Ok(())
}

fn cli_status(args: &[String], db: &mut Database) -> Result<()> {
    let budget = select_budget(args, db)?;
    let (period_id, period) = active_period(&budget, db)?;
    let allocations = db.get_allocations(period_id)?;
    let expenses = db.get_expenses(period_id)?;
    let balance = crate::reset::BalanceCalculator::summarize(&allocations, &expenses)?;
    let categories = db.get_categories()?;

    println!("{budget} ({})", period.month);
    println!("{}", "─".repeat(40));
    println!("  Income:     {}", format_amount(period.income));
    println!("  Allocated:  {}", format_amount(balance.allocated));
    println!("  Spent:      {}", format_amount(balance.spent));
    println!("  Remaining:  {}", format_amount(balance.remaining_balance));
    println!("  Expenses:   {}", balance.expense_count);
    if balance.has_remaining() {
        println!("  (reset with --rollover yes to carry the remaining balance forward)");
    }

    let mut category_ids: Vec<i64> = allocations
        .iter()
        .map(|a| a.category_id)
        .chain(expenses.iter().map(|e| e.category_id))
        .collect();
    category_ids.sort_unstable();
    category_ids.dedup();

    if !category_ids.is_empty() {
        println!();
        println!("  {:<24} {:>14} {:>14}", "Category", "Allocated", "Spent");
        for id in category_ids {
            let name = Category::find_by_id(&categories, id)
                .map(|c| c.name.as_str())
                .unwrap_or("Unknown");
            let allocated: Decimal = allocations
                .iter()
                .filter(|a| a.category_id == id)
                .map(|a| a.amount)
                .sum();
            let spent: Decimal = expenses
                .iter()
                .filter(|e| e.category_id == id)
                .map(|e| e.amount)
                .sum();
            println!(
                "  {name:<24} {:>14} {:>14}",
                format_amount(allocated),
                format_amount(spent)
            );
        }
    }
    Ok(())
}

fn cli_allocate(args: &[String], db: &mut Database) -> Result<()> {
    let pos = positional(args);
    let [category, amount] = pos.as_slice() else {
        anyhow::bail!("Usage: budget-rollover allocate <category> <amount>");
    };
    let budget = select_budget(args, db)?;
    let (period_id, period) = active_period(&budget, db)?;
    let category_id = resolve_category(category, db)?;
    let amount = parse_amount(amount)?;

    db.insert_allocation(&Allocation::new(period_id, category_id, amount))?;
    println!(
        "Allocated {} to {category} for {}",
        format_amount(amount),
        period.month
    );
    Ok(())
}

fn cli_spend(args: &[String], db: &mut Database) -> Result<()> {
    let pos = positional(args);
    let (category, amount, description) = match pos.as_slice() {
        [category, amount] => (*category, *amount, String::new()),
        [category, amount, rest @ ..] => (*category, *amount, rest.join(" ")),
        _ => anyhow::bail!("Usage: budget-rollover spend <category> <amount> [description]"),
    };
    let budget = select_budget(args, db)?;
    let (period_id, period) = active_period(&budget, db)?;
    let category_id = resolve_category(category, db)?;
    let amount = parse_amount(amount)?;

    db.insert_expense(&Expense::new(period_id, category_id, amount, description))?;
    println!(
        "Recorded {} in {category} for {}",
        format_amount(amount),
        period.month
    );
    Ok(())
}

fn cli_reset(args: &[String], db: &mut Database) -> Result<()> {
    let pos = positional(args);
    let [income] = pos.as_slice() else {
        anyhow::bail!("Usage: budget-rollover reset <income> [--rollover yes|no]");
    };
    let rollover = match flag_value(args, "--rollover").map(|v| v.to_lowercase()) {
        None => None,
        Some(v) if matches!(v.as_str(), "yes" | "y" | "true") => Some(true),
        Some(v) if matches!(v.as_str(), "no" | "n" | "false") => Some(false),
        Some(v) => anyhow::bail!("--rollover expects yes or no, got '{v}'"),
    };
    let budget = select_budget(args, db)?;
    let (period_id, period) = active_period(&budget, db)?;

    let mut notifier = ConsoleNotifier;
    let mut ctl = ResetController::open(db, &mut notifier, period_id)
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))?;

    let count = ctl.expense_count();
    println!(
        "This will archive {count} current expense{} from {} and start fresh.",
        if count == 1 { "" } else { "s" },
        period.month
    );
    println!("All data will be preserved for history and exports.");

    if ctl.gate_required() {
        println!(
            "Remaining balance: {}",
            format_amount(ctl.remaining_balance())
        );
        match rollover {
            Some(true) => ctl.choose_include()?,
            Some(false) => ctl.choose_exclude()?,
            None => {}
        }
    }
    ctl.set_income(income);

    if let Some(total) = ctl.total_available() {
        match ctl.gate_state() {
            GateState::Include => println!(
                "New income {} + remaining {} = {} available",
                income,
                format_amount(ctl.remaining_balance()),
                format_amount(total)
            ),
            _ => println!("Total available: {}", format_amount(total)),
        }
    }

    match ctl.submit() {
        Ok(receipt) => {
            println!(
                "Started {} (period {}) with income {}",
                receipt.new_period.month,
                receipt.new_period_id(),
                format_amount(receipt.new_period.income)
            );
            Ok(())
        }
        Err(e) => match ctl.validation_error() {
            Some(msg) if ctl.gate_required() && ctl.gate_state() == GateState::Undecided => {
                anyhow::bail!(
                    "{msg} ({} remaining). Re-run with --rollover yes or --rollover no",
                    format_amount(ctl.remaining_balance())
                )
            }
            Some(msg) => anyhow::bail!("{msg}"),
            None => Err(anyhow::Error::new(e).context("Budget reset failed")),
        },
    }
}

fn cli_history(args: &[String], db: &mut Database) -> Result<()> {
    let budget = select_budget(args, db)?;
    let budget_id = budget
        .id
        .ok_or_else(|| anyhow::anyhow!("Budget has no ID"))?;
    let periods = db.get_periods(budget_id)?;
    let rollovers = db.get_rollovers(budget_id)?;

    println!("{budget}");
    println!(
        "{:<6} {:<9} {:>14} {:<10} Rollover",
        "ID", "Month", "Income", "State"
    );
    println!("{}", "─".repeat(60));
    for period in &periods {
        let id = period.id.unwrap_or(0);
        let state = if period.is_active() { "active" } else { "archived" };
        let rollover = rollovers
            .iter()
            .find(|r| r.source_period_id == id)
            .map(|r| {
                format!(
                    "{} {} → period {}",
                    r.decision,
                    format_amount(r.amount),
                    r.new_period_id
                )
            })
            .unwrap_or_default();
        println!(
            "{:<6} {:<9} {:>14} {:<10} {}",
            id,
            period.month,
            format_amount(period.income),
            state,
            rollover
        );
    }
    Ok(())
}

fn cli_export(args: &[String], db: &mut Database) -> Result<()> {
    let pos = positional(args);
    let Some(raw_id) = pos.first() else {
        anyhow::bail!("Usage: budget-rollover export <period_id> [path]");
    };
    let period_id: i64 = raw_id
        .parse()
        .with_context(|| format!("Invalid period id: {raw_id}"))?;
    let period = db
        .get_period(period_id)?
        .ok_or_else(|| anyhow::anyhow!("Period {period_id} not found"))?;

    let output_path = pos
        .get(1)
        .map(|p| PathBuf::from(shellexpand(p)))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(format!("{home}/budget-{}-{period_id}.csv", period.month))
        });

    let count = db.export_period_csv(period_id, &output_path)?;
    if count == 0 {
        println!("No records for period {period_id}");
    } else {
        println!("Exported {count} records to {}", output_path.display());
    }
    Ok(())
}

fn cli_categories(db: &mut Database) -> Result<()> {
    for cat in db.get_categories()? {
        println!("{:<4} {cat}", cat.id.unwrap_or(0));
    }
    Ok(())
}

fn cli_add_category(args: &[String], db: &mut Database) -> Result<()> {
    let name = positional(args).join(" ");
    if name.trim().is_empty() {
        anyhow::bail!("Usage: budget-rollover add-category <name>");
    }
    let id = db
        .insert_category(&Category::new(name.clone()))
        .with_context(|| format!("Could not add category '{name}'"))?;
    println!("Added category {name} (id {id})");
    Ok(())
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
