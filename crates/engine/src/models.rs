use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    #[serde(alias = "start_time")]
    pub start: f64,
    #[serde(alias = "end_time")]
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    #[serde(alias = "start_time")]
    pub start: f64,
    #[serde(alias = "end_time")]
    pub end: f64,
    pub start_frame: i64,
    pub end_frame: i64,
    /// Base64 JPEG of the representative frame.
    #[serde(alias = "frame_image")]
    pub image: String,
}

impl SceneDescriptor {
    /// Half-open interval overlap; touching endpoints do not count.
    pub fn overlaps(&self, utterance: &Utterance) -> bool {
        utterance.start < self.end && utterance.end > self.start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAnswer {
    pub prompt: String,
    pub answer: String,
}

/// Globally unique name for the `local_number`-th (1-based) scene of chunk `order`.
pub fn scene_token(order: u32, local_number: usize) -> String {
    format!("chunk_{}_scene_{}", order, local_number)
}

pub fn parse_scene_token(token: &str) -> Option<(u32, usize)> {
    let rest = token.strip_prefix("chunk_")?;
    let (order, number) = rest.split_once("_scene_")?;
    Some((order.parse().ok()?, number.parse().ok()?))
}

pub fn thumbnail_folder(movie_id: i64) -> String {
    format!("thumbnails/{}", movie_id)
}

pub fn thumbnail_key(movie_id: i64, order: u32, local_number: usize) -> String {
    format!("{}/{}.jpg", thumbnail_folder(movie_id), scene_token(order, local_number))
}

/// Maps a scene token to the thumbnail reference its embedding is stored under.
pub fn thumbnail_for_token(movie_id: i64, token: &str) -> Option<String> {
    let (order, number) = parse_scene_token(token)?;
    Some(thumbnail_key(movie_id, order, number))
}
