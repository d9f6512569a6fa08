mod app;
mod commands;
mod keys;

use std::env;

fn main() {
	if env::var("RUST_LOG").is_err() {
		// log level not explicitly set by the user
		env::set_var("RUST_LOG", "info");
	}
	pretty_env_logger::init();

	let keys = keys::build_keys();
	let app = app::build_app(keys);
	let commands = commands::build_commands();

	let matches = app.get_matches();

	let res = match matches.subcommand() {
		Some((name, args)) => match commands.get(name) {
			Some(command) => command.evaluate(args),
			None => {
				log::error!("Unknown subcommand: {}", name);
				return;
			},
		},
		None => {
			log::error!("No action specified! Run with --help for the list of subcommands");
			return;
		},
	};

	if let Err(err) = res {
		log::error!("An error occurred while executing the command: {}", err);
		std::process::exit(1);
	}
}
