//! adir-proto
//!
//! Generated gRPC clients and servers for the five services: store,
//! routing, events, sync, naming. Nothing hand-written here beyond the
//! `include_proto!` wiring — the wire contract lives in `proto/`.

pub mod store {
    tonic::include_proto!("adir.store.v1");
}

pub mod routing {
    tonic::include_proto!("adir.routing.v1");
}

pub mod events {
    tonic::include_proto!("adir.events.v1");
}

pub mod sync {
    tonic::include_proto!("adir.sync.v1");
}

pub mod naming {
    tonic::include_proto!("adir.naming.v1");
}
