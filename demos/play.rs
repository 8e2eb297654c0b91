use std::io::Write;

use xsvf_player::cable;
use xsvf_player::progress::Tick;
use xsvf_player::xsvf::Decoder;
use xsvf_player::Player;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: play <image.xsvf> [cable] [--list]");
    let mut cable_name = "ft232r".to_string();
    let mut list = false;
    for arg in args {
        if arg == "--list" {
            list = true;
        } else {
            cable_name = arg;
        }
    }

    let image = std::fs::read(&path).expect("read image");

    if list {
        for item in Decoder::new(&image) {
            match item {
                Ok((offset, insn)) => println!("{:6}: {}", offset, insn),
                Err(e) => println!("error: {}", e),
            }
        }
        return;
    }

    let cable = cable::new_from_string(&cable_name, 1 << 16).expect("cable");
    let mut player = Player::new(cable);
    let result = player.play(&image, &mut |tick: Tick| {
        match tick {
            Tick::Decile(n) => print!("{}0% ", n),
            _ => print!("{}", tick.as_byte() as char),
        }
        let _ = std::io::stdout().flush();
    });
    println!();

    match result {
        Ok(done) => println!("{} instructions, {} scans, {} retries",
                             done.instructions, done.scans, done.retries),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
