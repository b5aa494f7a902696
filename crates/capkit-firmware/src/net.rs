//! WiFi connection and UDP listener glue.
//!
//! Connection follows the board's long-standing behavior: configure the
//! client, then retry at a fixed 500 ms poll until the link comes up —
//! no timeout, no backoff.

use capkit_core::creds::WifiCredentials;
use embassy_net::Stack;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfiguration, Configuration, WifiController, WifiError};
use log::{info, warn};

/// Port the UDP listener binds.
pub const UDP_PORT: u16 = 8888;

/// Largest UDP payload the listener reads per packet.
const PACKET_CAPACITY: usize = 255;

const CONNECT_POLL: Duration = Duration::from_millis(500);

/// Connects to the network named by `creds`, retrying forever.
pub async fn connect(
    controller: &mut WifiController<'static>,
    creds: &WifiCredentials,
) -> Result<(), WifiError> {
    info!("Connecting to {}", creds.ssid.as_str());

    let client = ClientConfiguration {
        ssid: creds.ssid.as_str().into(),
        password: creds.password.as_str().into(),
        ..Default::default()
    };
    controller.set_configuration(&Configuration::Client(client))?;
    controller.start_async().await?;

    loop {
        match controller.connect_async().await {
            Ok(()) => break,
            Err(e) => {
                warn!("WiFi connect failed: {e:?}, retrying");
                Timer::after(CONNECT_POLL).await;
            }
        }
    }

    while !matches!(controller.is_connected(), Ok(true)) {
        Timer::after(CONNECT_POLL).await;
    }

    info!("WiFi connected");
    Ok(())
}

/// Listens on [`UDP_PORT`] and logs every packet's origin, size and
/// payload. One packet is handled per loop turn.
pub async fn listen_udp(stack: Stack<'static>) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 8];
    let mut rx_buffer = [0u8; 1024];
    let mut tx_meta = [PacketMetadata::EMPTY; 8];
    let mut tx_buffer = [0u8; 1024];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(UDP_PORT).expect("failed to bind UDP listener");
    info!("UDP listener started on port {UDP_PORT}");

    let mut buf = [0u8; PACKET_CAPACITY];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, meta)) => {
                info!("Received packet of size {} from {}", len, meta.endpoint);
                match core::str::from_utf8(&buf[..len]) {
                    Ok(text) => info!("Message: {text}"),
                    Err(_) => info!("Message: {:?}", &buf[..len]),
                }
            }
            Err(e) => warn!("UDP receive error: {e:?}"),
        }
    }
}
