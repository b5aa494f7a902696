#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use embassy_executor::Spawner;
use embassy_net::{Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::touch::Touch;
use esp_hal::uart::Uart;
use esp_radio::wifi::WifiDevice;
use rtt_target::rprintln;
use static_cell::StaticCell;

use capkit_core::creds::CredentialStore;
use capkit_core::provision::prompt_credentials;
use capkit_core::touch::{SharedDispatcher, TouchDispatcher};
use capkit_firmware::flash::FlashCredentialBacking;
use capkit_firmware::net;
use capkit_firmware::pads::BoardTouch;

/// Scan cadence standing in for the touch interrupt.
const SCAN_INTERVAL: Duration = Duration::from_millis(20);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

static DISPATCHER: StaticCell<SharedDispatcher<BoardTouch<'static>>> = StaticCell::new();
static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_print!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("Embassy initialized!");

    // Credentials: flash record first, serial provisioning as fallback.
    let mut store = CredentialStore::new(FlashCredentialBacking::new());
    let creds = match store.read() {
        Ok(Some(c)) if c.is_complete() => c,
        _ => {
            let mut uart = Uart::new(peripherals.UART0, esp_hal::uart::Config::default())
                .expect("Failed to initialize UART0");
            let entered =
                prompt_credentials(&mut uart).expect("UART provisioning failed");
            if let Err(e) = store.write(&entered) {
                rprintln!("Failed to persist credentials: {:?}", e);
            }
            entered
        }
    };

    // WiFi controller and network stack.
    let mut rng = Rng::new(peripherals.RNG);
    let seed = ((rng.random() as u64) << 32) | rng.random() as u64;

    let radio_init = esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller");
    let (mut controller, interfaces) =
        esp_radio::wifi::new(&radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).expect("spawn net task");

    net::connect(&mut controller, &creds)
        .await
        .expect("WiFi configuration rejected");

    stack.wait_config_up().await;
    if let Some(cfg) = stack.config_v4() {
        rprintln!("IP address: {}", cfg.address);
    }

    spawner.spawn(udp_task(stack)).expect("spawn udp task");

    // Touch pads and dispatcher.
    let touch = Touch::continuous_mode(peripherals.TOUCH, None);
    let board = BoardTouch::new(&touch, peripherals.GPIO4, peripherals.GPIO15);
    let dispatcher = DISPATCHER.init(SharedDispatcher::new(TouchDispatcher::new(board)));

    dispatcher
        .register(4, |index, state| {
            rprintln!("touch pin 4 (binding {}): {}", index, state);
        })
        .expect("touch table allocation failed");
    dispatcher
        .register(15, |index, state| {
            rprintln!("touch pin 15 (binding {}): {}", index, state);
        })
        .expect("touch table allocation failed");

    loop {
        dispatcher.on_interrupt();
        Timer::after(SCAN_INTERVAL).await;
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn udp_task(stack: Stack<'static>) -> ! {
    net::listen_udp(stack).await
}
