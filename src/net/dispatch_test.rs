use super::*;

fn pong(ts: i64) -> Inbound {
    Inbound::Pong { ts }
}

#[test]
fn listeners_run_in_registration_order() {
    let mut table: Dispatcher<Vec<&'static str>> = Dispatcher::new();
    table.on(InboundKind::Pong, |log, _| {
        log.push("first");
        Ok(())
    });
    table.on(InboundKind::Pong, |log, _| {
        log.push("second");
        Ok(())
    });

    let mut log = Vec::new();
    assert!(table.dispatch(&mut log, &pong(1)).is_empty());
    assert_eq!(log, vec!["first", "second"]);
}

#[test]
fn only_matching_tag_is_invoked() {
    let mut table: Dispatcher<u32> = Dispatcher::new();
    table.on(InboundKind::Saving, |count, _| {
        *count += 1;
        Ok(())
    });

    let mut count = 0;
    table.dispatch(&mut count, &pong(1));
    assert_eq!(count, 0);
    table.dispatch(&mut count, &Inbound::Saving {});
    assert_eq!(count, 1);
}

#[test]
fn failing_listener_does_not_stop_the_rest() {
    let mut table: Dispatcher<Vec<i64>> = Dispatcher::new();
    table.on(InboundKind::Pong, |_, _| Err(SyncError::Server { message: "boom".to_owned() }));
    table.on(InboundKind::Pong, |seen, msg| {
        if let Inbound::Pong { ts } = msg {
            seen.push(*ts);
        }
        Ok(())
    });

    let mut seen = Vec::new();
    let errors = table.dispatch(&mut seen, &pong(42));
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], SyncError::Server { message } if message == "boom"));
    assert_eq!(seen, vec![42]);
}

#[test]
fn removed_listener_is_not_called() {
    let mut table: Dispatcher<u32> = Dispatcher::new();
    let first = table.on(InboundKind::Pong, |count, _| {
        *count += 1;
        Ok(())
    });
    table.on(InboundKind::Pong, |count, _| {
        *count += 10;
        Ok(())
    });
    assert_eq!(table.listener_count(InboundKind::Pong), 2);

    assert!(table.off(first));
    assert!(!table.off(first));
    assert_eq!(table.listener_count(InboundKind::Pong), 1);

    let mut count = 0;
    table.dispatch(&mut count, &pong(0));
    assert_eq!(count, 10);
}

#[test]
fn unregistered_tag_is_a_no_op() {
    let mut table: Dispatcher<u32> = Dispatcher::new();
    let mut count = 0;
    assert!(table.dispatch(&mut count, &Inbound::Unknown).is_empty());
    assert_eq!(table.listener_count(InboundKind::Unknown), 0);
}
