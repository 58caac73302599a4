use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mdf_internals::allocation::PfsPage;
use mdf_internals::{FilePageSource, Page, PageAddress, PageSource};

/// Dump decoded pages from an .mdf data file.
#[derive(Parser)]
#[command(name = "mdf-page-dump", version)]
struct Cli {
    /// Path to the .mdf file
    file: PathBuf,

    /// File id the pages belong to
    #[arg(long, default_value_t = 1)]
    file_id: i16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the decoded 96-byte header of a page
    Header { page_id: i32 },
    /// Print a page's slot offset table
    Slots { page_id: i32 },
    /// Print the PFS status of a page, resolved through the covering PFS page
    Pfs { page_id: i32 },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let source = FilePageSource::open_as(&cli.file, cli.file_id)?;

    match cli.command {
        Command::Header { page_id } => {
            let page = fetch(&source, cli.file_id, page_id)?;
            print_header(&page);
        }
        Command::Slots { page_id } => {
            let page = fetch(&source, cli.file_id, page_id)?;
            println!("slots: {}", page.offset_table().len());
            for (slot, offset) in page.offset_table().iter().enumerate() {
                println!("  {slot:>4}: {offset}");
            }
        }
        Command::Pfs { page_id } => {
            let interval = mdf_internals::allocation::PFS_INTERVAL as i32;
            let pfs_page_id = (page_id / interval) * interval;
            let pfs_address = if pfs_page_id == 0 {
                PageAddress::new(cli.file_id, 1)
            } else {
                PageAddress::new(cli.file_id, pfs_page_id)
            };

            let page = source.fetch(pfs_address)?;
            let pfs = PfsPage::parse(page)?;
            let status = pfs
                .status(page_id)
                .ok_or("page not covered by this pfs page")?;
            println!("{}: {status:?}", PageAddress::new(cli.file_id, page_id));
        }
    }

    Ok(())
}

fn fetch(source: &FilePageSource, file_id: i16, page_id: i32) -> Result<Page, Box<dyn Error>> {
    Ok(source.fetch(PageAddress::new(file_id, page_id))?)
}

fn print_header(page: &Page) {
    let header = page.header();
    println!("page address:   {}", header.page_address);
    println!("type:           {:?}", header.page_type);
    println!("level:          {}", header.level);
    println!("object id:      {}", header.object_id);
    println!("index id:       {}", header.index_id);
    println!("previous page:  {}", header.previous_page);
    println!("next page:      {}", header.next_page);
    println!("slot count:     {}", header.slot_count);
    println!("free count:     {}", header.free_count);
    println!("free data:      {}", header.free_data);
    println!("pminlen:        {}", header.fixed_length_size);
    println!("ghost records:  {}", header.ghost_record_count);
    println!("lsn:            {}", header.lsn);
    println!("torn bits:      {}", header.torn_bits);
}
