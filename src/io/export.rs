//! CSV and JSON export of planning results.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::model::SensitivityTable;
use crate::model::statistics::{BalanceRow, CapacityRow};
use crate::runner::PlanningRun;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column header of the capacity table.
const CAPACITY_HEADER: &[&str] = &[
    "component",
    "name",
    "carrier",
    "bus",
    "p_nom_opt_mw",
    "energy_gwh",
];

/// Creates `path` and hands a buffered writer to `write`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_to<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path)?;
    write(BufWriter::new(file))
}

/// Writes the energy balance as CSV: `timestamp`, one GW column per carrier
/// (sorted by name), then `load_gw`.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_dispatch_csv(rows: &[BalanceRow], writer: impl Write) -> io::Result<()> {
    let carriers: BTreeSet<&String> = rows.iter().flat_map(|r| r.supply_gw.keys()).collect();
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header = vec!["timestamp"];
    header.extend(carriers.iter().map(|c| c.as_str()));
    header.push("load_gw");
    wtr.write_record(&header)?;

    for r in rows {
        let mut record = vec![r.timestamp.format(TIMESTAMP_FORMAT).to_string()];
        for carrier in &carriers {
            let value = r.supply_gw.get(*carrier).copied().unwrap_or(0.0);
            record.push(format!("{value:.4}"));
        }
        record.push(format!("{:.4}", r.load_gw));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the optimal capacities as CSV. `energy_gwh` is empty for
/// generators and lines.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_capacities_csv(rows: &[CapacityRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(CAPACITY_HEADER)?;
    for r in rows {
        wtr.write_record(&[
            r.component.to_string(),
            r.name.clone(),
            r.carrier.clone(),
            r.bus.clone(),
            format!("{:.2}", r.p_nom_opt_mw),
            r.energy_gwh.map(|e| format!("{e:.4}")).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the sweep as CSV, one row per CO₂ limit with a bn €/a column per
/// carrier. Failed points keep empty cost cells and carry their error.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_sensitivity_csv(table: &SensitivityTable, writer: impl Write) -> io::Result<()> {
    let carriers = table.carriers();
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header = vec!["co2_limit_mt".to_string()];
    header.extend(carriers.iter().cloned());
    header.extend(["total_bn", "emissions_mt", "error"].map(String::from));
    wtr.write_record(&header)?;

    for p in &table.points {
        let mut record = vec![format!("{}", p.co2_limit_mt)];
        for carrier in &carriers {
            record.push(
                p.system_cost_bn
                    .get(carrier)
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_default(),
            );
        }
        record.push(p.total_cost_bn.map(|v| format!("{v:.4}")).unwrap_or_default());
        record.push(p.emissions_mt.map(|v| format!("{v:.4}")).unwrap_or_default());
        record.push(p.error.clone().unwrap_or_default());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the complete run (inputs, solution, statistics, sweep) as JSON.
///
/// # Errors
///
/// Returns an `io::Error` if serialisation or writing fails.
pub fn write_results_json(run: &PlanningRun, mut writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, run)?;
    writer.flush()
}
