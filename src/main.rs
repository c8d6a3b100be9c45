// Note: Game BoyTM and Game Boy PocketTM are registered trademarks of
// Nintendo CO., LTD. © 1989 to 1999 by Nintendo CO., LTD.
use dmg::cpu::Fault;
use dmg::motherboard::MotherBoard;
use dmg::serial::Console;

fn main() {
    rog::reg("dmg");
    rog::reg("dmg::cartridge");
    rog::reg("dmg::mmunit");

    let mut rom = String::from("");
    let mut max_instructions: u64 = 0;
    let mut headless = false;
    {
        let mut ap = argparse::ArgumentParser::new();
        ap.set_description("DMG emulator");
        ap.refer(&mut max_instructions).add_option(
            &["--max-instructions"],
            argparse::Store,
            "Stop after N instructions (0 = run forever)",
        );
        ap.refer(&mut headless)
            .add_option(&["--headless"], argparse::StoreTrue, "Run without a window");
        ap.refer(&mut rom).add_argument("rom", argparse::Store, "Rom path");
        ap.parse_args_or_exit();
    }

    let data = match std::fs::read(&rom) {
        Ok(ok) => ok,
        Err(e) => {
            rog::println!("Failed to read {}: {}", rom, e);
            std::process::exit(1);
        }
    };
    let mut mbrd = match MotherBoard::power_up(data) {
        Ok(ok) => ok,
        Err(e) => {
            rog::println!("Failed to load {}: {}", rom, e);
            std::process::exit(1);
        }
    };
    mbrd.plug_serial(Box::new(Console));

    let code = if headless {
        run_headless(mbrd, max_instructions)
    } else {
        run_gui(mbrd, max_instructions)
    };
    std::process::exit(code);
}

fn exit_code(mbrd: &MotherBoard) -> i32 {
    match mbrd.fault() {
        // Roms that halt through a self-jump terminated on purpose.
        Some(Fault::Unimplemented { .. }) => 1,
        _ => 0,
    }
}

fn run_headless(mut mbrd: MotherBoard, max_instructions: u64) -> i32 {
    loop {
        if !mbrd.tick() {
            break;
        }
        if max_instructions != 0 && mbrd.cpu.execs >= max_instructions {
            break;
        }
    }
    exit_code(&mbrd)
}

#[cfg(feature = "gui")]
fn run_gui(mut mbrd: MotherBoard, max_instructions: u64) -> i32 {
    use dmg::gpu::{SCREEN_H, SCREEN_W};
    use dmg::joypad::{Buttons, InputProvider};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct HostInput(Rc<RefCell<Buttons>>);

    impl InputProvider for HostInput {
        fn current_buttons(&self) -> Buttons {
            *self.0.borrow()
        }
    }

    let keys = Rc::new(RefCell::new(Buttons::default()));
    mbrd.plug_input(Box::new(HostInput(keys.clone())));

    let mut option = minifb::WindowOptions::default();
    option.resize = true;
    option.scale = minifb::Scale::X2;
    let rom_name = mbrd.romname();
    let mut window =
        minifb::Window::new(format!("DMG - {}", rom_name).as_str(), SCREEN_W, SCREEN_H, option).unwrap();
    let mut window_buffer = vec![0x00u32; SCREEN_W * SCREEN_H];
    window.update_with_buffer(window_buffer.as_slice()).unwrap();

    loop {
        if !window.is_open() || window.is_key_down(minifb::Key::Escape) {
            break;
        }
        if !mbrd.next() {
            break;
        }
        if max_instructions != 0 && mbrd.cpu.execs >= max_instructions {
            break;
        }
        if mbrd.check_and_reset_gpu_updated() {
            let frame = mbrd.frame();
            let mut i = 0;
            for line in frame.iter() {
                for shade in line.iter() {
                    // Shade 0 is the lightest.
                    let g = u32::from(0xff - shade * 0x55);
                    window_buffer[i] = 0xff00_0000 | (g << 16) | (g << 8) | g;
                    i += 1;
                }
            }
            window.update_with_buffer(window_buffer.as_slice()).unwrap();

            let pairs = [
                (minifb::Key::Right, 1 << 0),
                (minifb::Key::Left, 1 << 1),
                (minifb::Key::Up, 1 << 2),
                (minifb::Key::Down, 1 << 3),
            ];
            let mut dpad: u8 = 0x00;
            for (rk, bit) in pairs.iter() {
                if window.is_key_down(*rk) {
                    dpad |= bit;
                }
            }
            let pairs = [
                (minifb::Key::Z, 1 << 0),
                (minifb::Key::X, 1 << 1),
                (minifb::Key::Space, 1 << 2),
                (minifb::Key::Enter, 1 << 3),
            ];
            let mut buttons: u8 = 0x00;
            for (rk, bit) in pairs.iter() {
                if window.is_key_down(*rk) {
                    buttons |= bit;
                }
            }
            *keys.borrow_mut() = Buttons { dpad, buttons };
        }
    }
    exit_code(&mbrd)
}

#[cfg(not(feature = "gui"))]
fn run_gui(mbrd: MotherBoard, max_instructions: u64) -> i32 {
    rog::println!("Built without the gui feature; running headless");
    run_headless(mbrd, max_instructions)
}
