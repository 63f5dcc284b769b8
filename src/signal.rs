// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! SIGINT/SIGTERM handling: forward the first signal received to the
//! worker's stop channel so it finishes its current lease before exiting.

use async_std::channel::Sender;
use futures::StreamExt;
use signal_hook_async_std::Signals;

pub async fn handle_signals(mut signals: Signals, stop: Sender<()>) {
    while let Some(signal) = signals.next().await {
        tracing::info!(?signal, "received signal, shutting down worker");
        let _ = stop.send(()).await;
        break;
    }
}
