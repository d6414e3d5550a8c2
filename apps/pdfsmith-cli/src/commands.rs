use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use pdfsmith_core::{
    compress, decrypt, detect_encryption, encrypt, execute, extract_selection, images_to_pdf,
    merge, organize, parse_ranges, rotate, split_each, watermark, Config, EncryptionDescriptor,
    ImageInput, PdfCommand, PdfDocument, PdfSmithError,
};

use crate::cli::{Cli, Commands, OrderArg};

pub fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Merge { files, output } => {
            let documents = files.iter().map(|f| read(f)).collect::<Result<Vec<_>>>()?;
            let merged = merge(&documents).context("Merge failed")?;
            write(&output, &merged)?;
            tracing::info!(files = files.len(), output = %output.display(), "merged");
        }
        Commands::Extract {
            file,
            pages,
            output,
        } => {
            let selection = parse_ranges(&pages)?;
            let extracted = extract_selection(&read(&file)?, &selection).context("Extract failed")?;
            write(&output, &extracted)?;
            tracing::info!(pages = selection.len(), output = %output.display(), "extracted");
        }
        Commands::Split { file, out_dir } => {
            let parts = split_each(&read(&file)?).context("Split failed")?;
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            for (index, part) in parts.iter().enumerate() {
                write(&out_dir.join(format!("{}-page-{}.pdf", stem, index + 1)), part)?;
            }
            tracing::info!(pages = parts.len(), dir = %out_dir.display(), "split");
        }
        Commands::Rotate {
            file,
            angle,
            pages,
            output,
        } => {
            let indices = pages.as_deref().map(zero_based).transpose()?;
            let rotated = rotate(&read(&file)?, angle, indices.as_deref()).context("Rotate failed")?;
            write(&output, &rotated)?;
        }
        Commands::Organize {
            file,
            order: OrderArg(entries),
            output,
        } => {
            let organized = organize(&read(&file)?, &entries).context("Organize failed")?;
            write(&output, &organized)?;
        }
        Commands::Compress { file, output } => {
            let input = read(&file)?;
            let compressed = compress(&input).context("Compress failed")?;
            write(&output, &compressed)?;
            tracing::info!(before = input.len(), after = compressed.len(), "compressed");
        }
        Commands::Watermark {
            file,
            text,
            font_size,
            opacity,
            rotation,
            output,
        } => {
            let mut options = config.watermark;
            if let Some(font_size) = font_size {
                options.font_size = font_size;
            }
            if let Some(opacity) = opacity {
                options.opacity = opacity;
            }
            if let Some(rotation) = rotation {
                options.rotation = rotation;
            }
            let stamped = watermark(&read(&file)?, &text, &options).context("Watermark failed")?;
            write(&output, &stamped)?;
        }
        Commands::Images { images, output } => {
            let inputs = images.iter().map(|p| image_input(p)).collect::<Result<Vec<_>>>()?;
            let converted = images_to_pdf(&inputs).context("Image conversion failed")?;
            for name in &converted.skipped {
                tracing::warn!(file = %name, "skipped unsupported image");
            }
            write(&output, &converted.pdf)?;
        }
        Commands::Encrypt {
            file,
            user_password,
            owner_password,
            algorithm,
            no_print,
            no_copy,
            no_modify,
            output,
        } => {
            let mut options = config.encryption;
            if let Some(algorithm) = algorithm {
                options.algorithm = algorithm.into();
            }
            options.permissions.print &= !no_print;
            options.permissions.print_high_quality &= !no_print;
            options.permissions.copy &= !no_copy;
            options.permissions.modify &= !no_modify;

            let descriptor = EncryptionDescriptor {
                user_password,
                owner_password,
            };
            let encrypted = encrypt(&read(&file)?, &descriptor, &options).context("Encryption failed")?;
            write(&output, &encrypted)?;
        }
        Commands::Decrypt {
            file,
            password,
            output,
        } => {
            let decrypted = decrypt(&read(&file)?, &password).map_err(describe_password_error)?;
            write(&output, &decrypted)?;
        }
        Commands::Detect { file } => {
            let status = detect_encryption(&read(&file)?);
            print_json(&serde_json::json!({ "file": file, "status": status }))?;
        }
        Commands::Info { file, password } => {
            let bytes = read(&file)?;
            let doc = PdfDocument::open(&bytes, password.as_deref())
                .into_result()
                .map_err(describe_password_error)?;
            print_json(&doc.summary(bytes.len()))?;
        }
        Commands::Exec { command, output } => {
            let json = fs::read_to_string(&command)
                .with_context(|| format!("Failed to read {}", command.display()))?;
            let parsed: PdfCommand = serde_json::from_str(&json)
                .with_context(|| format!("Invalid command file {}", command.display()))?;
            let mut result = execute(parsed);
            if let Some(output) = output {
                if let Some(pdf) = result.pdf_bytes()? {
                    write(&output, &pdf)?;
                    result.data = None;
                }
            }
            print_json(&result)?;
            if !result.success {
                bail!(result.error.unwrap_or_else(|| "Command failed".to_string()));
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn zero_based(ranges: &str) -> Result<Vec<usize>> {
    let pages = parse_ranges(ranges)?;
    if pages.contains(&0) {
        bail!("page 0 is invalid (pages start at 1)");
    }
    Ok(pages.into_iter().map(|p| p as usize - 1).collect())
}

fn image_input(path: &Path) -> Result<ImageInput> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let media_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    };
    Ok(ImageInput {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        bytes: read(path)?,
        media_type: media_type.to_string(),
    })
}

fn describe_password_error(err: PdfSmithError) -> anyhow::Error {
    match err {
        PdfSmithError::PasswordRequired => {
            anyhow::anyhow!("{err}; pass --password to open it")
        }
        PdfSmithError::IncorrectPassword => anyhow::anyhow!("{err}; check the password and try again"),
        other => anyhow::Error::new(other),
    }
}
