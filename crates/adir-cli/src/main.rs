//! adir — the external collaborator's command-line client for an Agent
//! Directory node: every subcommand is a thin `tonic` call against the
//! node's gRPC surface, rendered through `--output {text|json|raw}`.

mod identity;
mod output;

use std::path::PathBuf;

use adir_codec::parse_reference;
use adir_proto::naming::naming_service_client::NamingServiceClient;
use adir_proto::routing::routing_service_client::RoutingServiceClient;
use adir_proto::routing::ListRequest as RoutingListRequest;
use adir_proto::store::store_service_client::StoreServiceClient;
use adir_proto::store::{push_request, PullRequest, PushMetadata, PushRequest};
use adir_proto::sync::sync_service_client::SyncServiceClient;
use adir_proto::sync::{CreateRequest, DeleteRequest as SyncDeleteRequest, StatusRequest};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tonic::transport::Channel;

use crate::output::{render, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "adir", version, about = "Agent Directory CLI")]
struct Cli {
    /// The node to talk to, e.g. http://127.0.0.1:8980.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8980")]
    node: String,

    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push a record (read as JSON from `path`).
    Push { path: PathBuf },
    /// Pull a record by reference (`name`, `name:version`, `name@cid`, or a bare CID).
    Pull { reference: String },
    /// Search labels across this node, optionally flooding the network.
    List(ListArgs),
    /// Resolve a reference and report its naming-verification status.
    Info {
        reference: String,
        #[arg(long)]
        network: bool,
    },
    /// Manage registry sync jobs.
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Derive a peer id from an Ed25519 private-key file.
    Generate {
        #[arg(long)]
        private_key_file_path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Label paths to search for, e.g. `/skills/NLP/Text Completion`.
    labels: Vec<String>,
    /// Flood the query across the peer network instead of answering locally.
    #[arg(long)]
    network: bool,
    /// Restrict to known peer-provider listings rather than a label search.
    #[arg(long)]
    peer: bool,
    /// Print only the CID of each match.
    #[arg(long)]
    digest: bool,
    #[command(subcommand)]
    sub: Option<ListSub>,
}

#[derive(Subcommand, Debug)]
enum ListSub {
    /// For every distinct name among the matches, also report naming-verification status.
    Info {
        #[arg(long)]
        network: bool,
        #[arg(long)]
        peer: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SyncAction {
    Create {
        remote_url: String,
        #[arg(long, default_value = "")]
        cid_filter: String,
    },
    Status {
        sync_id: String,
    },
    Delete {
        sync_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let channel = Channel::from_shared(cli.node.clone())
        .context("parsing --node endpoint")?
        .connect()
        .await
        .with_context(|| format!("connecting to node at {}", cli.node))?;

    match cli.command {
        Command::Push { path } => push(channel, cli.output, &path).await,
        Command::Pull { reference } => pull(channel, cli.output, &reference).await,
        Command::List(args) => list(channel, cli.output, args).await,
        Command::Info { reference, network } => info(channel, cli.output, &reference, network).await,
        Command::Sync { action } => sync(channel, cli.output, action).await,
        Command::Generate { private_key_file_path } => generate(cli.output, &private_key_file_path),
    }
}

async fn push(channel: Channel, output: OutputFormat, path: &std::path::Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading record file {}", path.display()))?;
    let record: adir_core::Record =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing record JSON in {}", path.display()))?;

    let metadata = PushMetadata {
        media_type: "application/vnd.adir.record.v1+json".into(),
        name: record.name.clone(),
        version: record.version.clone(),
        annotations: record.annotations.clone().into_iter().collect(),
        digest: None,
    };

    let mut messages = vec![PushRequest { part: Some(push_request::Part::Metadata(metadata)) }];
    const CHUNK_SIZE: usize = 64 * 1024;
    for chunk in bytes.chunks(CHUNK_SIZE) {
        messages.push(PushRequest { part: Some(push_request::Part::Chunk(chunk.to_vec())) });
    }

    let mut client = StoreServiceClient::new(channel);
    let response = client.push(futures::stream::iter(messages)).await?.into_inner();

    #[derive(Serialize)]
    struct PushResult {
        cid: String,
    }
    render(output, &PushResult { cid: response.cid.clone() }, || format!("pushed {}", response.cid));
    Ok(())
}

async fn pull(channel: Channel, output: OutputFormat, reference: &str) -> anyhow::Result<()> {
    let parsed = parse_reference(reference).with_context(|| format!("parsing reference {reference}"))?;
    let request = PullRequest {
        name: parsed.name.clone(),
        version: parsed.version.clone(),
        cid: parsed.cid.as_ref().map(|c| c.to_encoded()),
    };

    let mut client = StoreServiceClient::new(channel);
    let mut stream = client.pull(request).await?.into_inner();

    let mut bytes = Vec::new();
    while let Some(chunk) = futures::StreamExt::next(&mut stream).await {
        bytes.extend_from_slice(&chunk?.chunk);
    }

    if matches!(output, OutputFormat::Raw) {
        output::render_raw_bytes(output, &bytes, |b| String::from_utf8_lossy(b).into_owned());
        return Ok(());
    }

    let record: adir_core::Record = serde_json::from_slice(&bytes).context("decoding pulled record")?;
    render(output, &record, || {
        format!("{} {} ({} skills, {} domains)", record.name, record.version, record.skills.len(), record.domains.len())
    });
    Ok(())
}

async fn list(channel: Channel, output: OutputFormat, args: ListArgs) -> anyhow::Result<()> {
    // `--peer` narrows to provider listings rather than a fresh label
    // search, but the gRPC surface doesn't distinguish the two — both
    // resolve to the same `List` call, network-scoped per `--network`.
    let _ = args.peer;

    let mut client = RoutingServiceClient::new(channel);
    let request = RoutingListRequest {
        labels: args.labels.clone(),
        network: args.network,
        max_hops: None,
        allowed_peers: Vec::new(),
        blocked_peers: Vec::new(),
    };
    let mut stream = client.list(request).await?.into_inner();

    let mut items = Vec::new();
    while let Some(item) = futures::StreamExt::next(&mut stream).await {
        items.push(item?);
    }

    if let Some(ListSub::Info { network, .. }) = &args.sub {
        let mut naming_client = NamingServiceClient::new(client.into_inner());
        let mut seen = std::collections::HashSet::new();
        for item in &items {
            if !seen.insert(item.name.clone()) {
                continue;
            }
            let response = naming_client
                .info(adir_proto::naming::InfoRequest {
                    name: Some(item.name.clone()),
                    version: Some(item.version.clone()),
                    cid: None,
                    allow_network: *network,
                })
                .await?
                .into_inner();
            println!("{}: verified={}", item.name, response.verified);
        }
        return Ok(());
    }

    if args.digest {
        for item in &items {
            println!("{}", item.cid);
        }
        return Ok(());
    }

    render(output, &items, || {
        items
            .iter()
            .map(|i| format!("{}\t{}\t{}:{}", i.peer, i.cid, i.name, i.version))
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

async fn info(channel: Channel, output: OutputFormat, reference: &str, network: bool) -> anyhow::Result<()> {
    let parsed = parse_reference(reference).with_context(|| format!("parsing reference {reference}"))?;
    let mut client = NamingServiceClient::new(channel);
    let response = client
        .info(adir_proto::naming::InfoRequest {
            name: parsed.name.clone(),
            version: parsed.version.clone(),
            cid: parsed.cid.as_ref().map(|c| c.to_encoded()),
            allow_network: network,
        })
        .await?
        .into_inner();

    render(output, &json!({"cid": response.cid, "verified": response.verified, "ambiguous_alternatives": response.ambiguous_alternatives}), || {
        format!("{} verified={}", response.cid, response.verified)
    });

    if !response.ambiguous_alternatives.is_empty() {
        eprintln!("warning: name resolved ambiguously, {} alternative(s) discarded", response.ambiguous_alternatives.len());
    }
    Ok(())
}

async fn sync(channel: Channel, output: OutputFormat, action: SyncAction) -> anyhow::Result<()> {
    let mut client = SyncServiceClient::new(channel);
    match action {
        SyncAction::Create { remote_url, cid_filter } => {
            let response = client.create(CreateRequest { remote_url, cid_filter }).await?.into_inner();
            render(output, &json!({"sync_id": response.sync_id}), || response.sync_id.clone());
        }
        SyncAction::Status { sync_id } => {
            let response = client.status(StatusRequest { sync_id }).await?.into_inner();
            let status_name = response.status().as_str_name();
            render(
                output,
                &json!({"sync_id": response.sync_id, "status": status_name, "last_error": response.last_error}),
                || format!("{} status={} last_error={:?}", response.sync_id, status_name, response.last_error),
            );
        }
        SyncAction::Delete { sync_id } => {
            client.delete(SyncDeleteRequest { sync_id: sync_id.clone() }).await?;
            render(output, &json!({"deleted": sync_id}), || format!("deleted {sync_id}"));
        }
    }
    Ok(())
}

fn generate(output: OutputFormat, private_key_file_path: &std::path::Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(private_key_file_path)
        .with_context(|| format!("reading private key file {}", private_key_file_path.display()))?;
    let seed: [u8; 32] = bytes
        .get(..32)
        .and_then(|s| s.try_into().ok())
        .context("private key file must contain at least 32 bytes of Ed25519 seed material")?;

    let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
    let keypair = libp2p::identity::Keypair::ed25519_from_bytes(signing_key.to_bytes())
        .context("deriving a libp2p identity from the private key")?;
    let peer_id = libp2p::PeerId::from(keypair.public());

    render(output, &json!({"peer_id": peer_id.to_string()}), || peer_id.to_string());
    Ok(())
}
