/* This file is part of the ReelFeed client libraries
*
*  Copyright (C) 2025 mini_bomba
*
*  Some code was copied and adapted from the built library: https://github.com/lukaslueg/built,
*  which is licensed under the MIT license.
*  
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::{env, fs::File, io::{BufWriter, Write}, path::Path};

use chrono::{FixedOffset, TimeZone};
use cloneable_errors::{ErrContext, ErrorContext, ResContext};
use git2::Repository;

/// Release channel baked into `reelfeed --version`, e.g. `stable` or `nightly`
const CHANNEL_VAR: &str = "REELFEED_BUILD_CHANNEL";

fn main() -> Result<(), ErrorContext> {
    let built_file = Path::new(&env::var("OUT_DIR").context("OUT_DIR not set")?).join("built.rs");
    let manifest_location = env::var("CARGO_MANIFEST_DIR").context("CARGO_MANIFEST_DIR not set")?;
    let manifest_location = manifest_location.as_ref();

    // package, dependency and git info from built
    built::write_built_file_with_opts(
        Some(manifest_location),
        &built_file,
    ).context("Failed to compile build-time info")?;

    let mut file = BufWriter::new(File::options().append(true).open(&built_file).context("Failed to open the build-time info file")?);
    let commit_timestamp = git_commit_timestamp(manifest_location).context("Failed to compile extra build-time git info")?;
    let channel = env::var(CHANNEL_VAR).ok().filter(|c| !c.trim().is_empty());

    write_optional_const(&mut file, "GIT_COMMIT_TIMESTAMP", "The commit time in RFC3339/ISO8601.", commit_timestamp.as_deref())?;
    write_optional_const(&mut file, "BUILD_CHANNEL", "Release channel this binary was built for.", channel.as_deref().map(str::trim))?;
    file.flush().context("Failed to flush the build-time info file")?;
    Ok(())
}

/// `None` outside of a git checkout
fn git_commit_timestamp(manifest_loc: &Path) -> Result<Option<String>, ErrorContext> {
    let repo = match Repository::discover(manifest_loc) {
        Err(e) if e.class() == git2::ErrorClass::Repository && e.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.context("Failed to read git repo")),
        Ok(repo) => repo,
    };
    let commit_time = repo
        .head().context("Failed to read repo head")?
        .peel_to_commit().context("Failed to peel reference to commit")?
        .time();
    let tz = FixedOffset::east_opt(commit_time.offset_minutes() * 60).context("Commit timestamp had an invalid timezone offset")?;
    let commit_datetime = tz.timestamp_opt(commit_time.seconds(), 0).single().context("Commit timestamp was out of range")?;
    Ok(Some(commit_datetime.to_rfc3339()))
}

fn write_optional_const(file: &mut BufWriter<File>, name: &str, doc: &str, value: Option<&str>) -> Result<(), ErrorContext> {
    let value = match value {
        Some(v) => format!("Some(\"{}\")", v.escape_default()),
        None => "None".to_owned(),
    };
    writeln!(file, "\
        #[allow(clippy::needless_raw_string_hashes)]\n\
        #[doc=r#\"{doc}\"#]\n\
        #[allow(dead_code)]\n\
        pub const {name}: Option<&str> = {value};"
    ).with_context(|| format!("Failed to write {name} to the build-time info file"))?;
    Ok(())
}
