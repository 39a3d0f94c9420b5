//! Quick GPU check utility
use flock_compute::{device_info, gpu_available};

fn main() {
    println!("=== Flock GPU Check ===\n");
    println!("GPU Available: {}", gpu_available());
    println!("\nDevices found:");
    for device in device_info() {
        println!("  🎮 {} ", device.name);
        println!("     Vendor: {}", device.vendor);
        println!("     Type: {}", device.device_type);
        println!("     Backend: {}", device.backend);
        println!();
    }
}
