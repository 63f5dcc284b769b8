// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_async_std::Signals;
use signing_shim::config::ShimOptions;
use signing_shim::context::ShimContext;
use signing_shim::{api, signal::handle_signals};
use std::sync::Arc;
use structopt::StructOpt;

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    let opt = ShimOptions::from_args();
    let port = opt.port;

    let filter = tracing_subscriber::EnvFilter::try_new(opt.log_level.as_filter_directive())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    let ctx = Arc::new(ShimContext::new(opt).unwrap_or_else(|err| {
        panic!("invalid configuration: {}", err);
    }));

    let (worker_handle, stop_tx) = ctx.spawn_worker();

    let signals = Signals::new(&[SIGINT, SIGTERM]).unwrap();
    let signals_handle = signals.handle();
    let signals_task = async_std::task::spawn(handle_signals(signals, stop_tx));

    let app = api::build_app(ctx);
    let address = format!("0.0.0.0:{}", port);
    app.listen(address).await?;

    signals_handle.close();
    signals_task.await;
    worker_handle.await;

    Ok(())
}
