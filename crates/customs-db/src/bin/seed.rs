//! # Seed Data Generator
//!
//! Populates the database with tariff records, A.TR rates and one sample
//! calculation for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./customs_dev.db
//! cargo run -p customs-db --bin seed
//!
//! # Specify database path
//! cargo run -p customs-db --bin seed -- --db ./data/customs.db
//! ```
//!
//! The sample calculation is A.TR-flagged and mixes exempt origins, a code
//! with a preferential rate, a code without one, and a line with no Turkish
//! HS code, so every branch of the engine shows up in its report.

use chrono::NaiveDate;
use customs_core::money::decimal_or_zero;
use customs_core::{AtrRate, HsCode};
use customs_db::{Database, DbConfig, NewCalculation, NewCalculationItem};
use std::env;

/// (code, description, unit, customs, additional, kkdf, vat, ex registry, azo, special)
type TariffRow = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    bool,
    bool,
    bool,
);

#[rustfmt::skip]
const TARIFFS: &[TariffRow] = &[
    ("6109.10.00.00.00", "Pamuklu tişört", "ADET", "0.12", "0.2", "0.06", "0.1", false, true, false),
    ("6110.20.10.00.00", "Pamuklu kazak", "ADET", "0.12", "0.3", "0.06", "0.1", true, true, false),
    ("6204.62.31.00.00", "Kadın pantolonu, denim", "ADET", "0.12", "0.3", "0.06", "0.1", false, true, true),
    ("6203.42.31.00.00", "Erkek pantolonu, denim", "ADET", "0.12", "0.3", "0.06", "0.1", false, true, false),
    ("4202.92.91.00.00", "Çanta, plastik", "ADET", "0.03", "0.25", "0.06", "0.2", true, false, false),
    ("6402.99.98.00.00", "Ayakkabı, kauçuk taban", "ÇİFT", "0.17", "0.3", "0.06", "0.2", true, false, true),
];

const ATR_RATES: &[(&str, &str)] = &[
    ("6109.10.00.00.00", "0.04"),
    ("6204.62.31.00.00", "0.05"),
];

/// (style, description, tr hs code, origin, cost, units)
const ITEMS: &[(&str, &str, Option<&str>, &str, &str, i64)] = &[
    ("TS-1001", "Basic tee", Some("6109.10.00.00.00"), "TR", "4.25", 400),
    ("TS-1002", "Graphic tee", Some("6109.10.00.00.00"), "CN", "5.10", 300),
    ("KN-2001", "Crew neck sweater", Some("6110.20.10.00.00"), "BD", "11.80", 120),
    ("DN-3001", "Slim denim", Some("6204.62.31.00.00"), "IT", "14.00", 150),
    ("DN-3002", "Straight denim", Some("6203.42.31.00.00"), "VN", "12.60", 150),
    ("BG-4001", "Tote bag", Some("4202.92.91.00.00"), "CN", "3.40", 500),
    ("SM-9001", "Sample hanger", None, "CN", "0.10", 1000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./customs_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Customs Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./customs_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Customs Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.hs_codes().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} tariff records", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for &(code, description, unit, customs, additional, kkdf, vat, ex_form, azo, special) in
        TARIFFS
    {
        let mut hs = HsCode::with_rates(code, customs, additional, kkdf, vat);
        hs.description_tr = Some(description.to_string());
        hs.unit = Some(unit.to_string());
        hs.ex_registry_form = ex_form;
        hs.azo_dye_test = azo;
        hs.special_custom = special;
        db.hs_codes().upsert(&hs).await?;
    }
    println!("✓ {} tariff records", TARIFFS.len());

    for &(code, rate) in ATR_RATES {
        db.atr_rates()
            .upsert(&AtrRate {
                tr_hs_code: code.to_string(),
                customs_tax_percent: decimal_or_zero(Some(rate)),
            })
            .await?;
    }
    println!("✓ {} A.TR rates", ATR_RATES.len());

    let mut total_value = customs_core::Decimal::ZERO;
    let mut total_quantity = 0;
    for &(_, _, _, _, cost, units) in ITEMS {
        total_value += customs_core::money::line_total(decimal_or_zero(Some(cost)), units)
            .ok_or("line total out of range")?;
        total_quantity += units;
    }

    let calculation = db
        .calculations()
        .create(&NewCalculation {
            reference: "IMP-DEV-0001".to_string(),
            invoice_no: Some("INV-2024-118".to_string()),
            invoice_date: NaiveDate::from_ymd_opt(2024, 5, 6),
            total_value,
            total_quantity,
            transport_cost: decimal_or_zero(Some("1850")),
            insurance_cost: decimal_or_zero(Some("240")),
            storage_cost: decimal_or_zero(Some("610")),
            currency_rate: decimal_or_zero(Some("32.4518")),
            is_prepaid: false,
            is_atr: true,
        })
        .await?;

    for (line, &(style, description, code, origin, cost, units)) in ITEMS.iter().enumerate() {
        db.calculations()
            .add_item(
                &calculation.id,
                &NewCalculationItem {
                    line_number: line as i64 + 1,
                    style: Some(style.to_string()),
                    description: Some(description.to_string()),
                    hts_code: None,
                    tr_hs_code: code.map(str::to_string),
                    country_of_origin: Some(origin.to_string()),
                    cost: decimal_or_zero(Some(cost)),
                    unit_count: units,
                },
            )
            .await?;
    }

    println!("✓ Calculation {} ({} items)", calculation.id, ITEMS.len());
    println!();
    println!("Try: customs-calc --db {} precheck {}", db_path, calculation.id);
    println!("     customs-calc --db {} calculate {}", db_path, calculation.id);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
