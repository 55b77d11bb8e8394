use super::*;

fn channel() -> (mpsc::UnboundedSender<Frame>, mpsc::UnboundedReceiver<Frame>) {
    mpsc::unbounded_channel()
}

fn ping() -> Frame {
    Frame::BrowserStop {}
}

#[test]
fn starts_disconnected() {
    let hub = TransportHub::new();
    assert_eq!(hub.active(), ActiveTransport::Disconnected);
}

#[test]
fn connecting_primary_promotes_it_active() {
    let hub = TransportHub::new();
    let (tx, _rx) = channel();
    hub.connect_primary(tx);
    assert_eq!(hub.active(), ActiveTransport::Primary);
}

#[test]
fn send_while_disconnected_is_dropped_without_panicking() {
    let hub = TransportHub::new();
    hub.send(ping());
}

#[tokio::test]
async fn send_goes_to_the_active_transport() {
    let hub = TransportHub::new();
    let (tx, mut rx) = channel();
    hub.connect_primary(tx);
    hub.send(ping());
    assert!(rx.recv().await.is_some());
}

#[test]
fn secondary_handshake_is_promoted_active_when_primary_is_absent() {
    let hub = TransportHub::new();
    let (tx, _rx) = channel();
    hub.connect_secondary(tx);
    assert_eq!(hub.active(), ActiveTransport::Secondary);
}

#[test]
fn secondary_does_not_preempt_a_connected_primary() {
    let hub = TransportHub::new();
    let (ptx, _prx) = channel();
    let (stx, _srx) = channel();
    hub.connect_primary(ptx);
    hub.connect_secondary(stx);
    assert_eq!(hub.active(), ActiveTransport::Primary);
}

#[test]
fn primary_disconnect_fails_over_to_an_already_connected_secondary() {
    let hub = TransportHub::new();
    let (ptx, _prx) = channel();
    let (stx, _srx) = channel();
    hub.connect_primary(ptx);
    hub.connect_secondary(stx);
    hub.disconnect_primary();
    assert_eq!(hub.active(), ActiveTransport::Secondary);
}

#[test]
fn primary_disconnect_without_a_secondary_goes_disconnected() {
    let hub = TransportHub::new();
    let (ptx, _prx) = channel();
    hub.connect_primary(ptx);
    hub.disconnect_primary();
    assert_eq!(hub.active(), ActiveTransport::Disconnected);
}
