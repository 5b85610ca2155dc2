//! Capacity-planning helper: how many blocks to add to `nblks` when
//! sizing the lower device for a merkle block device.
//!
//! ```text
//! cargo run -p merkle_blkdev --example extra_blocks -- --nblks 1024
//! ```

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "extra-blocks", about = "Compute the overhead blocks a merkle block device needs")]
struct Cli {
    /// Number of data blocks the device will expose. Must be a power of
    /// two greater than 1 to be accepted by `DeviceHandle::open`.
    #[arg(short, long)]
    nblks: u64,
}

fn main() {
    let cli = Cli::parse();
    let extra = merkle_blkdev::extra_blocks(cli.nblks);
    let total = cli.nblks + extra;
    println!("nblks:       {}", cli.nblks);
    println!("extra_blocks: {extra}");
    println!("total_blocks: {total}");
    if !cli.nblks.is_power_of_two() || cli.nblks <= 1 {
        eprintln!(
            "warning: {} is not a power of two greater than 1; DeviceHandle::open will reject it",
            cli.nblks
        );
    }
}
