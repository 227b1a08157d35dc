use colored::*;

use crate::domain::changeset::Changeset;

pub fn print_summary(changeset: &Changeset) {
    println!();

    println!("{}", "SCHEMADRIFT CHANGE SUMMARY".bold().cyan());
    println!(
        "{} via {}",
        changeset.schema.blue(),
        changeset.driver.green()
    );
    println!("Changeset: {}", changeset.changeset_id.bright_yellow());
    println!();

    if changeset.is_empty() {
        println!("{}", "No drift detected.".italic());
        return;
    }

    let s = &changeset.summary;
    print_metric("Tables created", s.tables_created, Color::Green);
    print_metric("Tables renamed", s.tables_renamed, Color::Yellow);
    print_metric("Tables dropped", s.tables_dropped, Color::Red);
    print_metric("Columns added", s.columns_added, Color::Green);
    print_metric("Columns modified", s.columns_modified, Color::Yellow);
    print_metric("Columns renamed", s.columns_renamed, Color::Yellow);
    print_metric("Columns dropped", s.columns_dropped, Color::Red);
    print_metric("Index changes", s.index_changes, Color::Yellow);
    print_metric("Foreign key changes", s.foreign_key_changes, Color::Yellow);
    print_metric("Routines replaced", s.routines_replaced, Color::Yellow);
    println!();

    for statement in &changeset.statements {
        if statement.destructive {
            println!("  {}", statement.sql.red());
        } else {
            println!("  {}", statement.sql);
        }
    }

    println!();
    println!(
        "  Total: {} statement(s)  ·  {} destructive",
        s.total_statements.to_string().bold(),
        if s.destructive_statements > 0 {
            s.destructive_statements.to_string().red().to_string()
        } else {
            s.destructive_statements.to_string().green().to_string()
        },
    );
    println!();
}

fn print_metric(label: &str, value: usize, color: Color) {
    if value == 0 {
        return;
    }
    println!("  {:<22} {}", label, value.to_string().color(color).bold());
}
