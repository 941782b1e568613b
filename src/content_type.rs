//! File extension to media type mapping for stored objects.

pub const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Extensions of package files served as-is instead of being built.
const ASSET_EXTENSIONS: [&str; 27] = [
    "jsx", "ts", "mts", "tsx", "wasm", "css", "less", "sass", "scss", "json", "xml", "yml",
    "yaml", "txt", "md", "html", "htm", "svg", "png", "jpg", "webp", "gif", "eot", "ttf", "otf",
    "woff", "woff2",
];

pub fn is_asset_extension(ext: &str) -> bool {
    ASSET_EXTENSIONS.contains(&ext)
}

/// Media type for `path`, judged by its extension. Text types (and the
/// JavaScript, JSON, XML and SVG ones) carry `charset=utf-8`.
pub fn content_type_for(path: &str) -> &'static str {
    let file = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };
    if ext == "gz" && file.ends_with(".tar.gz") {
        return "application/tar+gzip";
    }
    match ext {
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "wasm" => "application/wasm",
        "json" | "map" => "application/json; charset=utf-8",
        "jsonc" => "application/jsonc; charset=utf-8",
        "json5" => "application/json5; charset=utf-8",
        "pdf" => "application/pdf",
        "xml" | "plist" | "tmLanguage" | "tmTheme" => "application/xml; charset=utf-8",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/tar",
        "tgz" => "application/tar+gzip",

        "html" | "htm" => "text/html; charset=utf-8",
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "mdx" => "text/mdx; charset=utf-8",
        "jsx" => "text/jsx; charset=utf-8",
        "ts" | "mts" => "text/typescript; charset=utf-8",
        "tsx" => "text/tsx; charset=utf-8",
        "vue" => "text/vue; charset=utf-8",
        "svelte" => "text/svelte; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "less" => "text/less; charset=utf-8",
        "sass" | "scss" => "text/sass; charset=utf-8",
        "stylus" | "styl" => "text/stylus; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "yaml" | "yml" => "text/yaml; charset=utf-8",
        "txt" | "glsl" => "text/plain; charset=utf-8",
        "frag" => "text/x-fragment; charset=utf-8",
        "vert" => "text/x-vertex; charset=utf-8",

        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttc" => "font/collection",

        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "apng" => "image/apng",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" | "svgz" => "image/svg+xml; charset=utf-8",
        "ico" => "image/x-icon",

        "m4a" => "audio/mp4",
        "mp3" | "m3a" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "weba" => "audio/webm",

        "mp4" | "m4v" => "video/mp4",
        "ogv" => "video/ogg",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",

        _ => DEFAULT_CONTENT_TYPE,
    }
}
