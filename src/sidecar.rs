use crate::errors::{FlacVaultError, Result};
use crate::model::{Job, MediaInfo};
use quick_xml::se::to_string;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename = "musicvideo")]
struct Nfo {
    title: String,
    artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genre: Option<String>,
    director: Vec<String>,
    studio: String,
    tag: Vec<String>,
    #[serde(rename = "uniqueid")]
    unique_ids: Vec<UniqueId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb: Option<Thumb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fanart: Option<Fanart>,
    dateadded: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fileinfo: Option<FileInfo>,
}

#[derive(Debug, Serialize)]
struct UniqueId {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@default")]
    default: bool,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize)]
struct Thumb {
    #[serde(rename = "@aspect")]
    aspect: String,
    #[serde(rename = "$text")]
    path: String,
}

#[derive(Debug, Serialize)]
struct Fanart {
    thumb: String,
}

#[derive(Debug, Serialize)]
struct FileInfo {
    streamdetails: StreamDetails,
}

#[derive(Debug, Serialize)]
struct StreamDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<VideoStream>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<AudioStream>,
}

#[derive(Debug, Serialize)]
struct VideoStream {
    codec: String,
    aspect: String,
    width: u32,
    height: u32,
    durationinseconds: u64,
}

#[derive(Debug, Serialize)]
struct AudioStream {
    codec: String,
    channels: u32,
}

/// Writes the NFO XML metadata sidecar and poster image next to the job's
/// output (§4.8). Non-fatal: callers log and continue on failure.
pub struct SidecarWriter {
    client: reqwest::Client,
}

impl SidecarWriter {
    pub fn new() -> Self {
        Self { client: reqwest::Client::builder().timeout(THUMBNAIL_TIMEOUT).build().unwrap_or_else(|_| reqwest::Client::new()) }
    }

    pub async fn write_nfo(&self, output_path: &Path, job: &Job, media: Option<&MediaInfo>, poster_relpath: Option<&str>) -> Result<PathBuf> {
        let mut unique_ids = vec![UniqueId { kind: "youtube".to_string(), default: true, value: job.source_url.clone() }];
        if let Some(isrc) = &job.isrc {
            unique_ids.push(UniqueId { kind: "isrc".to_string(), default: false, value: isrc.clone() });
        }

        let year = job.upload_date.as_deref().and_then(|d| d.get(0..4)).map(str::to_string);

        let fileinfo = media.map(|m| FileInfo {
            streamdetails: StreamDetails {
                video: m.video.as_ref().and_then(|v| {
                    Some(VideoStream {
                        codec: v.codec.clone().unwrap_or_default(),
                        aspect: format!("{}/{}", v.width.unwrap_or(0), v.height.unwrap_or(0)),
                        width: v.width?,
                        height: v.height?,
                        durationinseconds: job.duration_secs.unwrap_or(0),
                    })
                }),
                audio: m.audio.as_ref().map(|a| AudioStream { codec: a.codec.clone().unwrap_or_default(), channels: a.channels.unwrap_or(2) }),
            },
        });

        let nfo = Nfo {
            title: job.title.clone().unwrap_or_else(|| "Unknown".to_string()),
            artist: job.artist.clone().unwrap_or_else(|| "Unknown".to_string()),
            album: job.album.clone(),
            year,
            runtime: job.duration_secs.map(|s| s / 60),
            plot: job.description.clone(),
            genre: None,
            director: job.channel.clone().into_iter().collect(),
            studio: "YouTube".to_string(),
            tag: job.audio_source.clone().into_iter().collect(),
            unique_ids,
            thumb: poster_relpath.map(|p| Thumb { aspect: "poster".to_string(), path: p.to_string() }),
            fanart: poster_relpath.map(|p| Fanart { thumb: p.to_string() }),
            dateadded: format_local_now(),
            fileinfo,
        };

        let body = to_string(&nfo).map_err(FlacVaultError::Xml)?;
        let document = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n");

        let nfo_path = output_path.with_extension("nfo");
        std::fs::write(&nfo_path, document)?;
        Ok(nfo_path)
    }

    pub async fn write_poster(&self, output_path: &Path, thumbnail_url: &str) -> Result<PathBuf> {
        let response = self.client.get(thumbnail_url).send().await?;
        let bytes = response.bytes().await?;

        let stem = output_path.file_stem().and_then(|s| s.to_str()).unwrap_or("cover");
        let poster_path = output_path.with_file_name(format!("{stem}-poster.jpg"));
        std::fs::write(&poster_path, &bytes)?;
        Ok(poster_path)
    }
}

impl Default for SidecarWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_local_now() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let days = secs / 86_400;
    let time_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    format!("{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}", time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60)
}

/// Howard Hinnant's civil_from_days algorithm; avoids pulling in a datetime crate for one field.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_from_days_matches_known_epoch() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }
}
