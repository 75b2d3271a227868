// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;

use playzone::reports::local_date;
use playzone::{
    car_depreciation, daily_report, format_currency, format_duration, profit_and_loss,
    render_invoice, render_invoice_preview, seed_defaults, write_transactions_csv, AppConfig,
    BillingConfig, Car, CarKind, CarStatus, ExpenseCategory, ExpenseDraft, MenuItemDraft,
    OrderItem, PaymentMethod, PosError, SqliteStore, Venue,
};

#[derive(Parser)]
#[command(name = "playzone", version, about = "RC-car zone rentals and café POS")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "PLAYZONE_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and seed the default catalogue
    Init,
    /// Open the terminal dashboard (default)
    Ui,
    /// List zones and whether they are free
    Zones,
    /// List active sessions with their running bill
    Sessions,
    /// Start a session in a zone
    Start {
        #[arg(long)]
        zone: String,
        /// Comma-separated car ids, e.g. R1,R2
        #[arg(long, value_delimiter = ',', required = true)]
        cars: Vec<String>,
    },
    /// Add café items to an active session
    Order {
        session_id: String,
        /// Menu item id with optional quantity: 3 or 3x2
        #[arg(long = "item", required = true, value_parser = parse_order_line)]
        items: Vec<OrderItem>,
    },
    /// Show the running bill of an active session
    Bill { session_id: String },
    /// Check out an active session
    Checkout {
        session_id: String,
        #[arg(long, required = true)]
        payment: PaymentMethod,
        /// Print the invoice afterwards
        #[arg(long)]
        print: bool,
    },
    /// Print the invoice of a completed transaction or preview an active one
    Invoice { id: String },
    /// Audit trail of a session
    History { session_id: String },
    #[command(subcommand)]
    Cars(CarsCommand),
    #[command(subcommand)]
    Menu(MenuCommand),
    #[command(subcommand)]
    Expenses(ExpensesCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand)]
enum CarsCommand {
    List {
        /// Only cars that can start a session
        #[arg(long)]
        ready: bool,
        #[arg(long)]
        search: Option<String>,
    },
    Add(CarArgs),
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        kind: Option<CarKind>,
        #[arg(long)]
        price: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        lifespan: Option<u32>,
    },
    /// Set Ready, Charging or Maintenance
    Status { id: String, status: CarStatus },
    Delete { id: String },
}

#[derive(Args)]
struct CarArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    kind: CarKind,
    #[arg(long)]
    price: i64,
    /// Purchase date, YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,
    /// Expected lifespan in months
    #[arg(long)]
    lifespan: u32,
}

#[derive(Subcommand)]
enum MenuCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<i64>,
    },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ExpensesCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "Other")]
        category: ExpenseCategory,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        amount: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<ExpenseCategory>,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set {
        /// Price per chargeable minute
        #[arg(long)]
        rate: Option<i64>,
        #[arg(long)]
        free_minutes: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Revenue for one day (default: today)
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Profit and loss over a date range
    Pnl {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Book value of every car
    Depreciation {
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Completed transactions as CSV
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_order_line(s: &str) -> Result<OrderItem, String> {
    let (id, quantity) = match s.split_once(['x', 'X', '*']) {
        Some((id, qty)) => (id, qty),
        None => (s, "1"),
    };
    let menu_item_id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid menu item id '{}'", id))?;
    let quantity = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity '{}'", quantity))?;
    Ok(OrderItem {
        menu_item_id,
        quantity,
    })
}

fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().with_db_path(cli.db);

    if let Err(e) = run(cli.command.unwrap_or(Command::Ui), &config) {
        eprintln!("❌ {:#}", e);
        if let Some(hint) = e.downcast_ref::<PosError>().and_then(|p| p.hint()) {
            eprintln!("   {}", hint);
        }
        std::process::exit(1);
    }
}

fn open_venue(config: &AppConfig) -> Result<Venue<SqliteStore>> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    let venue = Venue::load(store).context("Failed to load venue data")?;
    Ok(venue)
}

fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Init => run_init(config),
        Command::Ui => run_ui_mode(config),
        Command::Cars(cmd) => run_cars(cmd, &mut open_venue(config)?),
        Command::Menu(cmd) => run_menu(cmd, &mut open_venue(config)?),
        Command::Expenses(cmd) => run_expenses(cmd, &mut open_venue(config)?),
        Command::Config(cmd) => run_config(cmd, &mut open_venue(config)?),
        Command::Report(cmd) => run_report(cmd, &open_venue(config)?, config),
        other => run_session_command(other, &mut open_venue(config)?, config),
    }
}

fn run_init(config: &AppConfig) -> Result<()> {
    println!("🏁 Playzone POS - Database Setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🔧 Setting up database...");
    let mut store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    println!("✓ {} initialized with WAL mode", config.db_path.display());

    println!("\n📦 Seeding default catalogue...");
    let summary = seed_defaults(&mut store)?;
    println!("✓ Cars added: {}", summary.cars);
    println!("✓ Menu items added: {}", summary.menu_items);
    if summary.billing_config {
        println!("✓ Default billing config stored");
    }

    let counts = store.table_counts()?;
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✅ Ready: {} cars, {} menu items, {} transactions",
        counts.cars, counts.menu_items, counts.completed_transactions
    );
    Ok(())
}

// ============================================================================
// SESSIONS
// ============================================================================

fn run_session_command(
    command: Command,
    venue: &mut Venue<SqliteStore>,
    config: &AppConfig,
) -> Result<()> {
    let now = Utc::now();

    match command {
        Command::Zones => {
            let free = venue.available_zones();
            for zone in playzone::PLAY_ZONES {
                let session = venue.active_sessions().iter().find(|s| s.zone == zone);
                match session {
                    Some(s) if !free.contains(&zone) => {
                        println!("🔴 {:<16} {} ({})", zone, s.id, s.car_ids.join(", "))
                    }
                    _ => println!("🟢 {:<16} free", zone),
                }
            }
        }
        Command::Sessions => {
            if venue.active_sessions().is_empty() {
                println!("No active sessions.");
            }
            for session in venue.active_sessions() {
                let bill = venue.running_bill(&session.id, now)?;
                println!(
                    "🎮 {}  {:<16} {}  cars: {}  total: {}",
                    session.id,
                    session.zone,
                    format_duration(bill.elapsed_seconds * 1000),
                    session.car_ids.join(", "),
                    format_currency(bill.total_cost)
                );
            }
        }
        Command::Start { zone, cars } => {
            let session = venue.start_session(&zone, &cars, now)?;
            println!("✅ Session {} started in {}", session.id, session.zone);
            println!("   Cars: {}", session.car_ids.join(", "));
        }
        Command::Order { session_id, items } => {
            let session = venue.add_order(&session_id, items)?;
            println!("✅ Session {} now has {} order line(s)", session.id, session.order.len());
        }
        Command::Bill { session_id } => {
            let bill = venue.running_bill(&session_id, now)?;
            println!("🧾 Session {}", session_id);
            println!("   Elapsed:      {}", format_duration(bill.elapsed_seconds * 1000));
            println!("   Chargeable:   {} min", bill.chargeable_minutes);
            println!("   Play cost:    {}", format_currency(bill.play_cost));
            println!("   Order cost:   {}", format_currency(bill.order_cost));
            println!("   Total:        {}", format_currency(bill.total_cost));
        }
        Command::Checkout {
            session_id,
            payment,
            print,
        } => {
            let txn = venue.checkout(&session_id, payment, now)?;
            println!(
                "✅ Checked out {}: {} via {}",
                txn.id,
                format_currency(txn.total_cost),
                txn.payment_method
            );
            if print {
                println!("\n{}", render_invoice(&config.venue_name, &txn, config.offset()));
            }
        }
        Command::Invoice { id } => {
            let text = match venue.transaction(&id) {
                Some(txn) => render_invoice(&config.venue_name, txn, config.offset()),
                None => {
                    // Method is a placeholder; the preview does not print it
                    let txn = venue.preview_checkout(&id, PaymentMethod::Cash, now)?;
                    render_invoice_preview(&config.venue_name, &txn, config.offset())
                }
            };
            println!("{}", text);
        }
        Command::History { session_id } => {
            let events = venue.store().events_for_entity("session", &session_id)?;
            if events.is_empty() {
                println!("No events for session {}", session_id);
            }
            for event in events {
                println!(
                    "📜 {}  {:<18} by {}",
                    event.timestamp.with_timezone(&config.offset()).format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.actor
                );
            }
        }
        _ => bail!("unsupported command"),
    }
    Ok(())
}

// ============================================================================
// INVENTORY, MENU, EXPENSES, SETTINGS
// ============================================================================

fn run_cars(command: CarsCommand, venue: &mut Venue<SqliteStore>) -> Result<()> {
    match command {
        CarsCommand::List { ready, search } => {
            let cars: Vec<&Car> = match (&search, ready) {
                (Some(term), _) => venue.search_ready_cars(term),
                (None, true) => venue.ready_cars(),
                (None, false) => venue.cars().iter().collect(),
            };
            println!("🚗 {} car(s)", cars.len());
            for car in cars {
                println!(
                    "   {:<5} {:<20} {:<13} {:<12} {:>14}  {}  {} mo",
                    car.id,
                    car.name,
                    car.kind.as_str(),
                    car.status,
                    format_currency(car.purchase_price),
                    car.purchase_date,
                    car.lifespan_months
                );
            }
        }
        CarsCommand::Add(args) => {
            let car = Car::new(&args.id, &args.name, args.kind, args.price, args.date, args.lifespan);
            let saved = venue.save_car(car, true)?;
            println!("✅ Car {} added", saved.id);
        }
        CarsCommand::Edit {
            id,
            name,
            kind,
            price,
            date,
            lifespan,
        } => {
            let mut car = venue
                .car(&id)
                .cloned()
                .ok_or_else(|| PosError::not_found("car", &id))?;
            if let Some(name) = name {
                car.name = name;
            }
            if let Some(kind) = kind {
                car.kind = kind;
            }
            if let Some(price) = price {
                car.purchase_price = price;
            }
            if let Some(date) = date {
                car.purchase_date = date;
            }
            if let Some(lifespan) = lifespan {
                car.lifespan_months = lifespan;
            }
            venue.save_car(car, false)?;
            println!("✅ Car {} updated", id);
        }
        CarsCommand::Status { id, status } => {
            venue.set_car_status(&id, status)?;
            println!("✅ Car {} is now {}", id, status);
        }
        CarsCommand::Delete { id } => {
            venue.delete_car(&id)?;
            println!("🗑️  Car {} deleted", id);
        }
    }
    Ok(())
}

fn run_menu(command: MenuCommand, venue: &mut Venue<SqliteStore>) -> Result<()> {
    match command {
        MenuCommand::List => {
            println!("☕ {} menu item(s)", venue.menu().len());
            for item in venue.menu() {
                println!("   {:>3}  {:<24} {:>12}", item.id, item.name, format_currency(item.price));
            }
        }
        MenuCommand::Add { name, price } => {
            let item = venue.save_menu_item(None, MenuItemDraft::new(&name, price))?;
            println!("✅ Menu item {} added with id {}", item.name, item.id);
        }
        MenuCommand::Edit { id, name, price } => {
            let current = playzone::entities::find_item(venue.menu(), id)
                .cloned()
                .ok_or_else(|| PosError::not_found("menu item", id))?;
            let draft = MenuItemDraft::new(
                name.as_deref().unwrap_or(&current.name),
                price.unwrap_or(current.price),
            );
            let item = venue.save_menu_item(Some(id), draft)?;
            println!("✅ Menu item {} updated", item.id);
        }
        MenuCommand::Delete { id } => {
            venue.delete_menu_item(id)?;
            println!("🗑️  Menu item {} deleted", id);
        }
    }
    Ok(())
}

fn run_expenses(command: ExpensesCommand, venue: &mut Venue<SqliteStore>) -> Result<()> {
    match command {
        ExpensesCommand::List => {
            println!("💸 {} expense(s)", venue.expenses().len());
            for e in venue.expenses() {
                println!(
                    "   {}  {:<24} {:<15} {:>14}  {}",
                    e.date,
                    e.name,
                    e.category.as_str(),
                    format_currency(e.amount),
                    e.id
                );
            }
        }
        ExpensesCommand::Add {
            name,
            amount,
            date,
            category,
        } => {
            let draft = ExpenseDraft {
                name: name.trim().to_string(),
                amount,
                date,
                category,
            };
            let saved = venue.save_expense(None, draft)?;
            println!("✅ Expense {} recorded", saved.id);
        }
        ExpensesCommand::Edit {
            id,
            name,
            amount,
            date,
            category,
        } => {
            let current = venue
                .expenses()
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .ok_or_else(|| PosError::not_found("expense", &id))?;
            let draft = ExpenseDraft {
                name: name.map(|n| n.trim().to_string()).unwrap_or(current.name),
                amount: amount.unwrap_or(current.amount),
                date: date.unwrap_or(current.date),
                category: category.unwrap_or(current.category),
            };
            venue.save_expense(Some(&id), draft)?;
            println!("✅ Expense {} updated", id);
        }
        ExpensesCommand::Delete { id } => {
            venue.delete_expense(&id)?;
            println!("🗑️  Expense {} deleted", id);
        }
    }
    Ok(())
}

fn run_config(command: ConfigCommand, venue: &mut Venue<SqliteStore>) -> Result<()> {
    match command {
        ConfigCommand::Show => {}
        ConfigCommand::Set { rate, free_minutes } => {
            let current = *venue.billing_config();
            let updated = BillingConfig {
                play_rate_per_minute: rate.unwrap_or(current.play_rate_per_minute),
                free_play_minutes: free_minutes.unwrap_or(current.free_play_minutes),
            };
            venue.save_billing_config(updated)?;
            println!("✅ Billing config saved");
        }
    }

    let config = venue.billing_config();
    println!("⚙️  Rate per minute:   {}", format_currency(config.play_rate_per_minute));
    println!("⚙️  Free minutes:      {}", config.free_play_minutes);
    Ok(())
}

// ============================================================================
// REPORTS
// ============================================================================

fn run_report(command: ReportCommand, venue: &Venue<SqliteStore>, config: &AppConfig) -> Result<()> {
    let offset = config.offset();
    let today = local_date(Utc::now(), offset);

    match command {
        ReportCommand::Daily { date } => {
            let report = daily_report(venue.transactions(), date.unwrap_or(today), offset);
            println!("📊 Daily revenue for {}", report.date);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("   Total revenue:  {}", format_currency(report.total_revenue));
            println!("   RC revenue:     {}", format_currency(report.play_revenue));
            println!("   Café revenue:   {}", format_currency(report.cafe_revenue));
            for total in &report.by_payment {
                println!(
                    "   {:<14}  {:>3} × {}",
                    total.method.as_str(),
                    total.count,
                    format_currency(total.amount)
                );
            }
            if report.transactions.is_empty() {
                println!("\n   No transactions today.");
            }
            for t in &report.transactions {
                println!(
                    "   {}  {:<16} {:<12} {:>12} {:>12} {:>12}  {}",
                    t.completed_at.with_timezone(&offset).format("%H:%M:%S"),
                    t.zone,
                    t.car_ids.join(","),
                    format_currency(t.play_cost),
                    format_currency(t.order_cost),
                    format_currency(t.total_cost),
                    t.payment_method
                );
            }
        }
        ReportCommand::Pnl { from, to } => {
            if to < from {
                bail!("--to must not be before --from");
            }
            let pnl = profit_and_loss(venue.transactions(), venue.expenses(), from, to, offset);
            println!("📈 Profit & loss {} → {}", pnl.from, pnl.to);
            println!("   Revenue:   {}", format_currency(pnl.revenue));
            println!("   Expenses:  {}", format_currency(pnl.expenses));
            println!("   Profit:    {}", format_currency(pnl.profit));
        }
        ReportCommand::Depreciation { on } => {
            let on = on.unwrap_or(today);
            println!("📉 Book values on {}", on);
            for car in venue.cars() {
                let d = car_depreciation(car, on);
                println!(
                    "   {:<5} {:>3}/{:<3} mo  {:>12}/mo  book {}",
                    d.car_id,
                    d.months_elapsed,
                    car.lifespan_months,
                    format_currency(d.monthly),
                    format_currency(d.book_value)
                );
            }
        }
        ReportCommand::Export { out } => {
            let rows = match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let rows = write_transactions_csv(file, venue.transactions())?;
                    eprintln!("✓ Wrote {} transaction(s) to {}", rows, path.display());
                    rows
                }
                None => write_transactions_csv(std::io::stdout().lock(), venue.transactions())?,
            };
            log::info!("Exported {} transactions", rows);
        }
    }
    Ok(())
}

// ============================================================================
// TUI
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading Playzone POS...\n");

    let mut venue = open_venue(config)?;
    if venue.cars().is_empty() && venue.menu().is_empty() {
        eprintln!("⚠️  The database is empty.");
        eprintln!("   Run: playzone init");
        eprintln!("   to seed the default catalogue first.");
    }

    let mut app = ui::App::new(config.clone());
    ui::run_ui(&mut app, &mut venue)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin playzone-server --features server");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_line() {
        assert_eq!(
            parse_order_line("3").unwrap(),
            OrderItem {
                menu_item_id: 3,
                quantity: 1
            }
        );
        assert_eq!(parse_order_line("2x4").unwrap().quantity, 4);
        assert!(parse_order_line("tea").is_err());
        assert!(parse_order_line("2x-1").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["playzone", "start", "--zone", "Track 1", "--cars", "R1,R2"])
            .unwrap();
        match cli.command {
            Some(Command::Start { zone, cars }) => {
                assert_eq!(zone, "Track 1");
                assert_eq!(cars, vec!["R1", "R2"]);
            }
            _ => panic!("expected start"),
        }

        let cli = Cli::try_parse_from(["playzone", "checkout", "S1", "--payment", "e-wallet"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Checkout {
                payment: PaymentMethod::EWallet,
                ..
            })
        ));
    }

    #[test]
    fn test_checkout_requires_payment_method() {
        let err = Cli::try_parse_from(["playzone", "checkout", "S1"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["playzone", "checkout", "S1", "--payment", "cash", "--print"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Checkout {
                payment: PaymentMethod::Cash,
                print: true,
                ..
            })
        ));
    }
}
