use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "freightbook: daily sailings and shipment manifests", long_about = None)]
pub struct Cli {
    /// Journal file to use instead of FREIGHTBOOK_STORE
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Create a viewer account and sign in
    SignUp {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Sign in and remember the session
    SignIn {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the remembered session
    SignOut,
    /// Show the signed-in user
    Whoami,
    /// Create the first admin account (no-op once an admin exists)
    BootstrapAdmin {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Change a user's role (admins only)
    SetRole {
        uid: String,
        /// admin, operator or viewer
        role: String,
    },
}

/// Identifies one shipment.
#[derive(Args, Debug)]
pub struct ShipmentRef {
    /// Sailing date, YYYY-MM-DD
    pub date: String,
    pub ship: String,
}

#[derive(Subcommand, Debug)]
pub enum ShipCommands {
    /// Add a ship to a day and create its header
    Register {
        ship: String,
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "")]
        carrier_line: String,
        #[arg(long, default_value = "")]
        voy: String,
        #[arg(long, default_value = "")]
        etd: String,
        #[arg(long, default_value = "")]
        eta: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DetailCommands {
    /// Print header, line items and comments
    Show {
        #[command(flatten)]
        shipment: ShipmentRef,
    },
    /// Set cells of one line item and save
    Set {
        #[command(flatten)]
        shipment: ShipmentRef,
        /// Row id, or its 1-based position in `show`
        row: String,
        /// FIELD=VALUE, e.g. KGS=1200
        #[arg(required = true)]
        cells: Vec<String>,
    },
    /// Append a line item and save
    AddRow {
        #[command(flatten)]
        shipment: ShipmentRef,
        /// FIELD=VALUE cells for the new row
        cells: Vec<String>,
    },
    /// Delete line items and save
    Rm {
        #[command(flatten)]
        shipment: ShipmentRef,
        /// Row ids or 1-based positions
        #[arg(required_unless_present = "all")]
        rows: Vec<String>,
        /// Delete every line item
        #[arg(long, conflicts_with = "rows")]
        all: bool,
    },
    /// Post a comment
    Comment {
        #[command(flatten)]
        shipment: ShipmentRef,
        text: String,
    },
    /// Print column totals, optionally writing them to the header
    Totals {
        #[command(flatten)]
        shipment: ShipmentRef,
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(subcommand)]
    /// Accounts and sessions
    Auth(AuthCommands),

    /// List the sailings of one month
    Calendar {
        /// YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },

    #[command(subcommand)]
    /// Register sailings
    Ship(ShipCommands),

    #[command(subcommand)]
    /// View and edit one shipment manifest
    Detail(DetailCommands),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_store_flag_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "freightbook",
            "calendar",
            "--month",
            "2024-03",
            "--store",
            "/tmp/fb.log",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/fb.log")));
        assert!(matches!(cli.command, Commands::Calendar { month: Some(ref m) } if m == "2024-03"));
    }

    #[test]
    fn detail_set_collects_cells() {
        let cli = Cli::try_parse_from([
            "freightbook",
            "detail",
            "set",
            "2024-03-05",
            "GA1108",
            "2",
            "KGS=1200",
            "CBM=3.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Detail(DetailCommands::Set {
                shipment,
                row,
                cells,
            }) => {
                assert_eq!(shipment.date, "2024-03-05");
                assert_eq!(shipment.ship, "GA1108");
                assert_eq!(row, "2");
                assert_eq!(cells, vec!["KGS=1200", "CBM=3.5"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rm_needs_rows_or_all() {
        assert!(Cli::try_parse_from(["freightbook", "detail", "rm", "2024-03-05", "GA1"]).is_err());
        assert!(
            Cli::try_parse_from(["freightbook", "detail", "rm", "2024-03-05", "GA1", "--all"])
                .is_ok()
        );
        assert!(
            Cli::try_parse_from(["freightbook", "detail", "rm", "2024-03-05", "GA1", "x", "--all"])
                .is_err()
        );
    }

    #[test]
    fn sign_in_requires_password() {
        assert!(Cli::try_parse_from(["freightbook", "auth", "sign-in", "a@example.com"]).is_err());
        let cli = Cli::try_parse_from([
            "freightbook",
            "auth",
            "sign-in",
            "a@example.com",
            "--password",
            "secret1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Auth(AuthCommands::SignIn { .. })));
    }
}
