use std::thread;
use std::time::{Duration, Instant};

use quarry_blocks::Block;
use quarry_chunk::Chunk;
use quarry_service::{
    ChunkService, ClientError, DataKey, Message, RequestKind, ServiceClient, Value,
};
use quarry_world::{ChunkCoord, Config};

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.service.connection_wait_ms = 20;
    cfg
}

fn filled(cfg: &Config, layers: i32, block: Block) -> Chunk {
    let mut chunk = Chunk::new(cfg.dims());
    for (x, z) in chunk.all_columns() {
        for y in 0..layers {
            chunk.set_block(x, y, z, block).unwrap();
        }
    }
    chunk
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn ping_and_named_clients() {
    let cfg = test_config();
    let (mut service, main) = ChunkService::spawn(&cfg).unwrap();
    main.ping().unwrap();
    let gen_client = main.new_client(Some("World Generator")).unwrap();
    assert_eq!(gen_client.name(), "World Generator");
    let anon = main.new_client(None).unwrap();
    assert_eq!(anon.name().len(), cfg.service.random_id_len);
    gen_client.ping().unwrap();
    anon.ping().unwrap();
    service.stop();
    assert!(!service.is_running());
}

#[test]
fn set_overwrites_and_marks_generated() {
    let cfg = test_config();
    let (_service, main) = ChunkService::spawn(&cfg).unwrap();
    let coord = ChunkCoord::new(3, -4);
    assert!(!main.is_generated(coord).unwrap());

    let a = filled(&cfg, 1, Block::GRASS);
    main.set_chunk(coord, a.clone()).unwrap();
    assert!(main.is_generated(coord).unwrap());
    assert_eq!(main.get_chunk(coord).unwrap(), a);

    let b = filled(&cfg, 2, Block::STONE);
    main.set_chunk(coord, b.clone()).unwrap();
    let stored = main.get_chunk(coord).unwrap();
    assert_eq!(stored, b);
    assert!(stored.is_generated());

    let err = main.init_chunk(coord, a).unwrap_err();
    assert!(err.is_duplicate_init());
    assert_eq!(main.get_chunk(coord).unwrap(), b);
}

#[test]
fn init_chunk_has_exactly_one_winner() {
    let cfg = test_config();
    let (_service, main) = ChunkService::spawn(&cfg).unwrap();
    let coord = ChunkCoord::new(0, 0);
    let candidates: Vec<Chunk> = (1..=8)
        .map(|layers| filled(&cfg, layers, Block::GRASS))
        .collect();

    let handles: Vec<_> = candidates
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, chunk)| {
            let client = main.new_client(Some(&format!("racer-{i}"))).unwrap();
            thread::spawn(move || match client.init_chunk(coord, chunk) {
                Ok(()) => Some(i),
                Err(e) if e.is_duplicate_init() => None,
                Err(e) => panic!("unexpected error: {e}"),
            })
        })
        .collect();
    let winners: Vec<usize> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(main.get_chunk(coord).unwrap(), candidates[winners[0]]);
}

#[test]
fn malformed_requests_keep_the_connection_open() {
    let cfg = test_config();
    let (_service, main) = ChunkService::spawn(&cfg).unwrap();

    let reply = main
        .send_request(Message::new(RequestKind::SetChunk))
        .unwrap();
    assert_eq!(reply.kind, RequestKind::Invalid);

    let reply = main
        .send_request(
            Message::new(RequestKind::IsGenerated)
                .with(DataKey::ChunkPos, Value::Text("0,0".to_string())),
        )
        .unwrap();
    assert_eq!(reply.kind, RequestKind::Invalid);

    match main.send_request(Message::new(RequestKind::DuplicateInit)) {
        Ok(reply) => assert_eq!(reply.kind, RequestKind::Invalid),
        Err(e) => panic!("connection dropped: {e}"),
    }
    main.ping().unwrap();
}

#[test]
fn closing_a_secondary_client_keeps_serving() {
    let cfg = test_config();
    let (service, main) = ChunkService::spawn(&cfg).unwrap();
    let extra = main.new_client(Some("short-lived")).unwrap();
    extra.ping().unwrap();
    drop(extra);
    thread::sleep(Duration::from_millis(60));
    assert!(service.is_running());
    main.ping().unwrap();
    // the freed name can be registered again
    let again = main.new_client(Some("short-lived")).unwrap();
    assert_eq!(again.name(), "short-lived");
}

#[test]
fn closing_the_primary_client_stops_the_service() {
    let cfg = test_config();
    let (service, main) = ChunkService::spawn(&cfg).unwrap();
    let other = main.new_client(None).unwrap();
    drop(main);
    assert!(wait_until(|| !service.is_running()));
    assert!(matches!(other.ping(), Err(ClientError::Disconnected)));
}

#[test]
fn client_exposes_the_coordinate_mapping() {
    let cfg = test_config();
    let dims = cfg.dims();
    let abs = ServiceClient::chunk_local_to_abs(dims, ChunkCoord::new(-1, 2), 15, 3, 0);
    assert_eq!(abs, (-1, 3, 32));
    let (coord, local) = ServiceClient::abs_to_chunk_local(dims, abs.0, abs.1, abs.2);
    assert_eq!(coord, ChunkCoord::new(-1, 2));
    assert_eq!(local, (15, 3, 0));
}

fn assert_send<T: Send>() {}

#[test]
fn each_thread_keeps_its_replies_with_its_own_handle() {
    assert_send::<ServiceClient>();
    let cfg = test_config();
    let (_service, main) = ChunkService::spawn(&cfg).unwrap();
    let set = ChunkCoord::new(1, 1);
    let empty = ChunkCoord::new(9, 9);
    main.set_chunk(set, filled(&cfg, 1, Block::GRASS)).unwrap();

    let (a, b) = (
        main.new_client(Some("reader-a")).unwrap(),
        main.new_client(Some("reader-b")).unwrap(),
    );
    let ha = thread::spawn(move || (0..500).filter(|_| !a.is_generated(set).unwrap()).count());
    let hb = thread::spawn(move || (0..500).filter(|_| b.is_generated(empty).unwrap()).count());
    assert_eq!(ha.join().unwrap(), 0);
    assert_eq!(hb.join().unwrap(), 0);
}
