//! One gitup run: discovery, fetch, decode, delta resolution, checkout,
//! remote-state install. Strictly sequential; any error aborts the run and
//! leaves the previous remote-state file in place.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gitup_config::Settings;
use gitup_hash::ObjectId;
use gitup_pack::decode;
use gitup_pack::delta::apply;
use gitup_pack::ObjectStore;
use gitup_protocol::{advertisement, request::FetchRequest, response};
use gitup_transport::HttpsClient;
use gitup_worktree::manifest::Manifest;
use gitup_worktree::{materialize, snapshot};

use crate::Cli;

pub fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(&cli.config, &cli.section)
        .with_context(|| format!("cannot load {}", cli.config.display()))?;
    if let Some(level) = cli.verbosity {
        settings.verbosity = level;
    }
    let verbosity = settings.verbosity;

    let snapshot = snapshot::scan(&settings.target)?;

    fs::create_dir_all(&settings.work_directory)
        .with_context(|| format!("cannot create {}", settings.work_directory.display()))?;
    let state_path = settings.work_directory.join(&cli.section);
    let manifest = Manifest::load(&state_path)?;

    let mut want = cli
        .want
        .as_deref()
        .map(ObjectId::from_hex)
        .transpose()
        .context("invalid -w value")?;
    let have = match cli.have.as_deref() {
        Some(hex) => Some(ObjectId::from_hex(hex).context("invalid -h value")?),
        None => manifest.as_ref().map(|m| m.commit),
    };

    let clone = cli.clone || manifest.is_none() || !settings.target.exists();

    if verbosity >= 1 {
        eprintln!("# Host: {}", settings.host);
        eprintln!("# Port: {}", settings.port);
        eprintln!("# Repository: {}", settings.repository);
        eprintln!("# Branch: {}", settings.branch);
        eprintln!("# Target: {}", settings.target.display());
        if let Some(have) = have {
            eprintln!("# Have: {have}");
        }
    }

    // A pull refuses to run over local modifications; the operator has to
    // resolve them (or force a clone) first.
    if !clone {
        if let Some(manifest) = &manifest {
            manifest.verify(&snapshot)?;
        }
    }

    let usable_pack_file = cli
        .use_pack
        .as_deref()
        .filter(|path| path.exists());

    let pack = match usable_pack_file {
        Some(path) => {
            if want.is_none() {
                want = want_from_pack_name(path, &cli.section);
            }
            if verbosity >= 1 {
                eprintln!("# Using pack file: {}", path.display());
            }
            fs::read(path).with_context(|| format!("cannot read {}", path.display()))?
        }
        None => fetch_pack(&settings, clone, have, &mut want, verbosity)?,
    };
    let want = want.context("no want commit id; pass -w or let discovery provide one")?;

    if cli.keep_pack {
        let pack_path = settings
            .work_directory
            .join(format!("{}-{}.pack", cli.section, want));
        fs::write(&pack_path, &pack)
            .with_context(|| format!("cannot write {}", pack_path.display()))?;
        if verbosity >= 1 {
            eprintln!("# Saved pack file: {}", pack_path.display());
        }
    }

    let mut store = ObjectStore::new();
    decode::unpack(&pack, &mut store)?;
    apply::apply_deltas(&mut store, |oid| snapshot.payload_for(oid))?;

    if verbosity >= 2 {
        for record in store.records() {
            eprintln!(
                "#### {:05} {:?} offset={} size={} id={}",
                record.index,
                record.kind,
                record.pack_offset,
                record.payload.len(),
                record
                    .id
                    .map(|id| id.to_hex())
                    .unwrap_or_else(|| "-".into()),
            );
        }
    }

    // An up-to-date pull returns an empty pack. The tree is already right;
    // reinstall the manifest to record the successful run.
    if store.is_empty() {
        if let Some(manifest) = manifest {
            manifest.install(&state_path)?;
        }
        if verbosity >= 1 {
            eprintln!("# Already up to date");
        }
        return Ok(());
    }

    let files = materialize::checkout(&store, want, &snapshot, |path, is_new| {
        if verbosity >= 1 {
            println!(" {} {}", if is_new { '+' } else { '*' }, path.display());
        }
    })?;

    if verbosity >= 1 {
        eprintln!("# {} objects unpacked, {} files tracked", store.len(), files.len());
    }

    Manifest::new(want, files).install(&state_path)?;
    Ok(())
}

/// Run discovery and the fetch POST, returning the raw pack bytes.
fn fetch_pack(
    settings: &Settings,
    clone: bool,
    have: Option<ObjectId>,
    want: &mut Option<ObjectId>,
    verbosity: u8,
) -> Result<Vec<u8>> {
    let client = HttpsClient::new(settings.host.clone(), settings.port);

    let discovery = client.get(&format!(
        "{}/info/refs?service=git-upload-pack",
        settings.repository
    ))?;
    let advertised = advertisement::parse(&discovery, &settings.branch)?;

    let want_id = want.unwrap_or(advertised.want);
    *want = Some(want_id);
    if verbosity >= 1 {
        eprintln!("# Want: {want_id}");
    }

    let request = FetchRequest {
        agent: &advertised.agent,
        want: want_id,
        have: if clone { None } else { have },
    };
    let response_body = client.post(
        &format!("{}/git-upload-pack", settings.repository),
        "application/x-git-upload-pack-request",
        "application/x-git-upload-pack-result",
        &request.to_bytes()?,
    )?;

    let pack = response::extract_pack(&response_body, |message| {
        if verbosity >= 1 {
            eprint!("remote: {}", String::from_utf8_lossy(message));
        }
    })?;
    Ok(pack)
}

/// Recover the want id from a `<section>-<40-hex>.pack` file name.
fn want_from_pack_name(path: &Path, section: &str) -> Option<ObjectId> {
    let stem = path.file_name()?.to_str()?.strip_suffix(".pack")?;
    let hex = stem.strip_prefix(section)?.strip_prefix('-')?;
    ObjectId::from_hex(hex).ok()
}
