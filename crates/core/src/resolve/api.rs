//! Response shapes of the Bilibili web endpoints the resolver talks to.
//! Fields are optional wherever the API is known to omit them.

use serde::{Deserialize, Deserializer};

/// Envelope shared by the Bilibili JSON endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// `data` of `/x/web-interface/view`.
#[derive(Debug, Deserialize)]
pub struct ViewData {
    #[serde(default)]
    pub aid: Option<u64>,
    #[serde(default)]
    pub pages: Option<Vec<PageInfo>>,
    #[serde(default)]
    pub subtitle: Option<ViewSubtitles>,
}

/// One part of a multi-part video.
#[derive(Debug, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub cid: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewSubtitles {
    #[serde(default)]
    pub list: Vec<Track>,
}

/// `data` of `/x/player/v2`.
#[derive(Debug, Deserialize)]
pub struct PlayerData {
    #[serde(default)]
    pub subtitle: Option<PlayerSubtitles>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerSubtitles {
    #[serde(default)]
    pub subtitles: Option<Vec<Track>>,
}

/// A fetchable subtitle track as listed by either endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Track {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lan: String,
    /// Human readable language name, only used for logging.
    #[serde(default)]
    pub lan_doc: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subtitle_url: String,
}

/// The API sends `null` for fields it has no value for; treat it as absent.
fn null_as_empty<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_without_data() {
        let resp: ApiResponse<ViewData> =
            serde_json::from_str(r#"{"code":-404,"message":"啥都木有","data":null}"#).unwrap();
        assert_eq!(resp.code, -404);
        assert!(resp.data.is_none());
    }

    #[test]
    fn view_data_with_subtitles() {
        let resp: ApiResponse<ViewData> = serde_json::from_str(
            r#"{"code":0,"data":{"aid":7,"pages":[{"page":1,"cid":10,"part":"intro"}],
                "subtitle":{"allow_submit":false,"list":[{"id":1,"lan":"zh-CN","lan_doc":"中文（中国）","subtitle_url":"//cdn/x.json"}]}}}"#,
        )
        .unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.aid, Some(7));
        assert_eq!(data.pages.unwrap()[0].cid, Some(10));
        let list = data.subtitle.unwrap().list;
        assert_eq!(list[0].lan, "zh-CN");
        assert_eq!(list[0].subtitle_url, "//cdn/x.json");
    }

    #[test]
    fn null_track_fields_read_as_empty() {
        let subs: ViewSubtitles = serde_json::from_str(
            r#"{"list":[{"id":1,"lan":null,"subtitle_url":null},{"id":2,"lan":"zh-CN","subtitle_url":"//cdn/y.json"}]}"#,
        )
        .unwrap();
        assert_eq!(subs.list[0].lan, "");
        assert_eq!(subs.list[0].subtitle_url, "");
        assert_eq!(subs.list[1].subtitle_url, "//cdn/y.json");
    }
}
