use std::path::Path;

/// The fixed instruction sent with every analysis request.
pub const NUTRITION_PROMPT: PromptTemplate = PromptTemplate(
    "\nAs an expert nutritionist, your task is to meticulously analyze the food items present in the image.\n\
     \n\
     **Part 1: Calorie Breakdown**\n\
     Identify every distinct food item. For each item, provide a precise estimate of its calorie content. \
     Present this information as a numbered list, strictly adhering to the following format:\n\
     1. [Identified Food Item] - [Estimated Calories] calories (e.g., 1. Apple - 95 calories)\n\
     2. [Identified Food Item] - [Estimated Calories] calories\n\
     ...\n\
     \n\
     **Part 2: Health Assessment & Nutritional Breakdown**\n\
     After detailing the individual items, provide an overall health assessment of the entire meal. \
     Clearly state whether the food is generally considered 'Healthy' or 'Not Healthy'.\n\
     \n\
     Subsequently, provide an estimated percentage distribution of the key macronutrients and micronutrients \
     for the entire meal. Include:\n\
     - **Carbohydrates:** [Percentage]%\n\
     - **Fats:** [Percentage]%\n\
     - **Proteins:** [Percentage]%\n\
     - **Fibers:** [Percentage]%\n\
     - **Sugars:** [Percentage]% (if applicable and estimable)\n\
     - Mention the Total Calories present and Also mention any other notable vitamins or minerals \
     (e.g., Vitamin C, Iron) if their presence is evident from the food items.\n\
     \n\
     Ensure your response is clear, precise, and directly addresses all parts of this prompt.\n",
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate(&'static str);

impl PromptTemplate {
    pub fn text(&self) -> &'static str {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
        }
    }

    /// Parses a declared content type such as `image/png; charset=binary`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            "image/png" => Some(ImageMime::Png),
            _ => None,
        }
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" => Some(ImageMime::Jpeg),
            "png" => Some(ImageMime::Png),
            _ => None,
        }
    }

    /// Resolves the type of an upload the way the file picker does: the
    /// declared content type wins unless it is absent or generic, in which
    /// case the file extension decides.
    pub fn resolve(content_type: Option<&str>, file_name: Option<&str>) -> Option<Self> {
        match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
            Some(ct) if !ct.eq_ignore_ascii_case("application/octet-stream") => {
                Self::from_content_type(ct)
            }
            _ => file_name.and_then(Self::from_file_name),
        }
    }
}

impl std::fmt::Display for ImageMime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user upload, kept byte-for-byte as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub mime: ImageMime,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(file_name: Option<String>, mime: ImageMime, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            mime,
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    pub prompt: &'static str,
    pub image: Option<UploadedImage>,
}

impl InferenceRequest {
    pub fn new(template: PromptTemplate, image: Option<UploadedImage>) -> Self {
        Self {
            prompt: template.text(),
            image,
        }
    }
}

/// Outcome of one analysis, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceResult {
    Text(String),
    Failure { message: String, detail: String },
}
