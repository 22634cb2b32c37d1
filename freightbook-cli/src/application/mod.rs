pub mod handlers;

use crate::presentation::cli::{AuthCommands, Cli, Commands, DetailCommands, ShipCommands};
use clap::Parser;
use freightbook_core::ShipRegistration;
use freightbook_core::error::Result;
use handlers::AppContext;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::open(cli.store)?;
    match cli.command {
        Commands::Auth(auth_cmd) => match auth_cmd {
            AuthCommands::SignUp {
                email,
                password,
                name,
            } => handlers::handle_sign_up(&ctx, email, password, name),
            AuthCommands::SignIn { email, password } => {
                handlers::handle_sign_in(&ctx, email, password)
            }
            AuthCommands::SignOut => handlers::handle_sign_out(&ctx),
            AuthCommands::Whoami => handlers::handle_whoami(&ctx),
            AuthCommands::BootstrapAdmin { email, password } => {
                handlers::handle_bootstrap_admin(&ctx, email, password)
            }
            AuthCommands::SetRole { uid, role } => handlers::handle_set_role(&ctx, uid, role),
        },
        Commands::Calendar { month } => handlers::handle_calendar(&ctx, month),
        Commands::Ship(ShipCommands::Register {
            ship,
            date,
            carrier_line,
            voy,
            etd,
            eta,
        }) => handlers::handle_ship_register(
            &ctx,
            ShipRegistration {
                ship_id: ship,
                date,
                carrier_line,
                voy,
                etd,
                eta,
            },
        ),
        Commands::Detail(detail_cmd) => match detail_cmd {
            DetailCommands::Show { shipment } => {
                handlers::handle_detail_show(&ctx, shipment.date, shipment.ship)
            }
            DetailCommands::Set {
                shipment,
                row,
                cells,
            } => handlers::handle_detail_set(&ctx, shipment.date, shipment.ship, row, cells),
            DetailCommands::AddRow { shipment, cells } => {
                handlers::handle_detail_add_row(&ctx, shipment.date, shipment.ship, cells)
            }
            DetailCommands::Rm {
                shipment,
                rows,
                all,
            } => handlers::handle_detail_rm(&ctx, shipment.date, shipment.ship, rows, all),
            DetailCommands::Comment { shipment, text } => {
                handlers::handle_detail_comment(&ctx, shipment.date, shipment.ship, text)
            }
            DetailCommands::Totals { shipment, write } => {
                handlers::handle_detail_totals(&ctx, shipment.date, shipment.ship, write)
            }
        },
    }
}
