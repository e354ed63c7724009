use super::ExportError;
use crate::rpc::RpcGateway;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Wallet directories expected inside a copied `regtest/` directory.
const EXPECTED_WALLET_DIRS: [&str; 4] = ["default", "light", "normal", "heavy"];

const BLOCKS_PROGRESS_INTERVAL: u64 = 50;

/// Outcome of copying the daemon's `regtest/` directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDataCopy {
	pub bytes: u64,
	/// Expected wallet directories present in the copy.
	pub wallet_dirs: Vec<String>,
}

impl ChainDataCopy {
	pub fn size_mb(&self) -> f64 {
		self.bytes as f64 / 1024.0 / 1024.0
	}
}

/// Copy `<data_dir>/regtest` to `<output_dir>/regtest`, replacing an existing copy.
///
/// Returns `None` when the data dir has no `regtest/` directory.
pub fn copy_chain_data(
	data_dir: &Path,
	output_dir: &Path,
) -> Result<Option<ChainDataCopy>, ExportError> {
	let source = data_dir.join("regtest");
	if !source.is_dir() {
		warn!("No regtest directory found in {}", data_dir.display());
		return Ok(None);
	}

	info!("Copying dashd datadir from {}", data_dir.display());
	let dest = output_dir.join("regtest");
	if dest.exists() {
		std::fs::remove_dir_all(&dest).map_err(|e| ExportError::io(&dest, e))?;
	}
	let bytes = copy_dir_recursive(&source, &dest)?;

	let wallet_dirs: Vec<String> = EXPECTED_WALLET_DIRS
		.iter()
		.filter(|name| dest.join(name).is_dir())
		.map(|name| name.to_string())
		.collect();

	let copy = ChainDataCopy { bytes, wallet_dirs };
	info!("Copied regtest data ({:.1} MB)", copy.size_mb());
	if copy.wallet_dirs.is_empty() {
		warn!("No wallet directories found in regtest");
	} else {
		info!(
			"Wallet directories copied ({} wallets: {})",
			copy.wallet_dirs.len(),
			copy.wallet_dirs.join(", ")
		);
	}
	Ok(Some(copy))
}

/// Copy `source` into `dest` recursively, following symlinks. Returns the bytes copied.
fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<u64, ExportError> {
	std::fs::create_dir_all(dest).map_err(|e| ExportError::io(dest, e))?;

	let mut bytes = 0;
	for entry in std::fs::read_dir(source).map_err(|e| ExportError::io(source, e))? {
		let entry = entry.map_err(|e| ExportError::io(source, e))?;
		let from = entry.path();
		let to = dest.join(entry.file_name());
		let metadata = std::fs::metadata(&from).map_err(|e| ExportError::io(&from, e))?;

		if metadata.is_dir() {
			bytes += copy_dir_recursive(&from, &to)?;
		} else {
			bytes += std::fs::copy(&from, &to).map_err(|e| ExportError::io(&from, e))?;
		}
	}
	Ok(bytes)
}

/// Dump raw blocks to `path` in the legacy `blocks.dat` layout.
///
/// Layout, all integers u32 little-endian: block count, then per block its height, its
/// length and the serialized block. Heights `0..count` are written, where `count` is the
/// current `getblockcount`.
pub async fn write_blocks_dat(rpc: &dyn RpcGateway, path: &Path) -> Result<u64, ExportError> {
	info!("Exporting blocks.dat...");
	let block_count = rpc.get_block_count().await?;

	let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
	let mut out = BufWriter::new(file);
	let mut write = |bytes: &[u8]| out.write_all(bytes).map_err(|e| ExportError::io(path, e));

	write(&(block_count as u32).to_le_bytes())?;

	for height in 0..block_count {
		if height > 0 && height % BLOCKS_PROGRESS_INTERVAL == 0 {
			info!(
				"Exporting blocks: {}/{} ({}%)",
				height,
				block_count,
				height * 100 / block_count
			);
		}

		let hash = rpc.get_block_hash(height).await?;
		let raw = rpc.get_raw_block(&hash).await?;
		let bytes = hex::decode(raw.trim())
			.map_err(|source| ExportError::BlockDecode { height, source })?;

		write(&(height as u32).to_le_bytes())?;
		write(&(bytes.len() as u32).to_le_bytes())?;
		write(&bytes)?;
	}

	out.flush().map_err(|e| ExportError::io(path, e))?;
	let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
	info!("blocks.dat ({:.1} MB)", size as f64 / 1024.0 / 1024.0);
	Ok(block_count)
}
